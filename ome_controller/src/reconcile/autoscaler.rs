//! Horizontal pod autoscaler builder and equality.

use std::str::FromStr;

use ome_definitions::constants::{
    AutoscalerClass, DeploymentMode, ScaleMetric, AUTOSCALER_CLASS_ANNOTATION,
    DEFAULT_TARGET_UTILIZATION, METRICS_ANNOTATION, TARGET_UTILIZATION_ANNOTATION,
};
use ome_definitions::structs::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec, MetricSpec,
    MetricTarget, ObjectMeta, ResourceMetricSource,
};
use ome_definitions::{names, InferenceService};

use super::workload::{component_child_name, component_labels, EffectiveComponent};

/// The autoscaler backend for a service; `hpa` unless annotated otherwise.
pub fn autoscaler_class(isvc: &InferenceService) -> AutoscalerClass {
    isvc.metadata
        .annotation(AUTOSCALER_CLASS_ANNOTATION)
        .and_then(|raw| AutoscalerClass::from_str(raw).ok())
        .unwrap_or(AutoscalerClass::Hpa)
}

pub fn build_hpa(
    isvc: &InferenceService,
    eff: &EffectiveComponent,
    mode: DeploymentMode,
) -> HorizontalPodAutoscaler {
    let name = component_child_name(&isvc.metadata.name, eff.component);
    let mut metadata = ObjectMeta::named(&name, &isvc.metadata.namespace);
    metadata.labels = component_labels(isvc, eff.component);
    metadata.ownerReferences = vec![isvc.owner_reference()];
    // the class annotation participates in HPA equality
    metadata.annotations.insert(
        AUTOSCALER_CLASS_ANNOTATION.to_string(),
        match autoscaler_class(isvc) {
            AutoscalerClass::Hpa => "hpa",
            AutoscalerClass::Keda => "keda",
            AutoscalerClass::External => "external",
        }
        .to_string(),
    );

    // annotation overrides beat the component spec
    let metric = isvc
        .metadata
        .annotation(METRICS_ANNOTATION)
        .and_then(|raw| ScaleMetric::from_str(raw).ok())
        .unwrap_or(eff.scale_metric);
    let target = isvc
        .metadata
        .annotation(TARGET_UTILIZATION_ANNOTATION)
        .and_then(|raw| raw.parse::<u32>().ok())
        .or(eff.scale_target)
        .unwrap_or(DEFAULT_TARGET_UTILIZATION);

    let (kind, target_name) = if mode == DeploymentMode::MultiNode {
        ("LeaderWorkerSet".to_string(), names::lws_name(&isvc.metadata.name))
    } else {
        ("Deployment".to_string(), name.clone())
    };

    HorizontalPodAutoscaler {
        metadata,
        spec: HorizontalPodAutoscalerSpec {
            scaleTargetRef: CrossVersionObjectReference { kind, name: target_name },
            minReplicas: Some(eff.min_replicas),
            maxReplicas: eff.max_replicas,
            metrics: vec![MetricSpec {
                type_: "Resource".to_string(),
                resource: Some(ResourceMetricSource {
                    name: metric.as_str().to_string(),
                    target: MetricTarget {
                        type_: "Utilization".to_string(),
                        averageUtilization: Some(target),
                    },
                }),
            }],
        },
    }
}

/// Two HPAs are equal when the class annotation matches and the spec
/// deep-equals.
pub fn hpa_same(a: &HorizontalPodAutoscaler, b: &HorizontalPodAutoscaler) -> bool {
    a.metadata.annotation(AUTOSCALER_CLASS_ANNOTATION)
        == b.metadata.annotation(AUTOSCALER_CLASS_ANNOTATION)
        && a.spec == b.spec
}
