//! Metrics aggregation and prometheus scrape annotations.

use ome_definitions::constants::{
    AGGREGATED_METRICS_PORT, AGGREGATE_METRICS_PORT_ENV, APP_METRICS_PATH_ANNOTATION,
    APP_METRICS_PATH_ENV, APP_METRICS_PORT_ANNOTATION, APP_METRICS_PORT_ENV,
    DEFAULT_APP_METRICS_PORT, DEFAULT_METRICS_PATH, ENABLE_METRIC_AGGREGATION_ANNOTATION,
    ENABLE_PROMETHEUS_SCRAPING_ANNOTATION, PROMETHEUS_PATH_ANNOTATION,
    PROMETHEUS_PORT_ANNOTATION, PROMETHEUS_SCRAPE_ANNOTATION, QUEUE_PROXY_CONTAINER_NAME,
};
use ome_definitions::structs::{ContainerPort, Pod};

pub fn inject(pod: &mut Pod) {
    let aggregate = pod
        .metadata
        .annotation_is_true(ENABLE_METRIC_AGGREGATION_ANNOTATION);
    let app_port = pod
        .metadata
        .annotation(APP_METRICS_PORT_ANNOTATION)
        .unwrap_or("")
        .parse::<u32>()
        .unwrap_or(DEFAULT_APP_METRICS_PORT);
    let app_path = pod
        .metadata
        .annotation(APP_METRICS_PATH_ANNOTATION)
        .unwrap_or(DEFAULT_METRICS_PATH)
        .to_string();

    if aggregate {
        match pod.spec.container_mut(QUEUE_PROXY_CONTAINER_NAME) {
            Some(proxy) => {
                proxy.set_env(AGGREGATE_METRICS_PORT_ENV, &AGGREGATED_METRICS_PORT.to_string());
                proxy.set_env(APP_METRICS_PORT_ENV, &app_port.to_string());
                proxy.set_env(APP_METRICS_PATH_ENV, &app_path);
                let has_port = proxy
                    .ports
                    .iter()
                    .any(|p| p.containerPort == AGGREGATED_METRICS_PORT);
                if !has_port {
                    proxy.ports.push(ContainerPort {
                        name: Some("aggr-metrics".to_string()),
                        containerPort: AGGREGATED_METRICS_PORT,
                        protocol: None,
                    });
                }
            }
            None => warn!(
                "pod {} enables metric aggregation but has no {} container",
                pod.metadata.name, QUEUE_PROXY_CONTAINER_NAME
            ),
        }
    }

    if pod
        .metadata
        .annotation_is_true(ENABLE_PROMETHEUS_SCRAPING_ANNOTATION)
    {
        let scrape_port = if aggregate { AGGREGATED_METRICS_PORT } else { app_port };
        let annotations = &mut pod.metadata.annotations;
        annotations.insert(PROMETHEUS_SCRAPE_ANNOTATION.to_string(), "true".to_string());
        annotations.insert(PROMETHEUS_PORT_ANNOTATION.to_string(), scrape_port.to_string());
        annotations.insert(PROMETHEUS_PATH_ANNOTATION.to_string(), app_path);
    }
}
