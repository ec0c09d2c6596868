//! Serving and training sidecars.
//!
//! Both point a long-running helper at the downloaded weights; the mount
//! subpath depends on the fine-tune strategy because adapters, tfew masks
//! and merged weights land in different directories.

use std::str::FromStr;

use ome_definitions::constants::{
    FineTuneStrategy, FINE_TUNED_WEIGHT_STRATEGY_ANNOTATION,
    INJECT_FINE_TUNED_ADAPTER_ANNOTATION, INJECT_SERVING_SIDECAR_ANNOTATION,
    INJECT_TRAINING_SIDECAR_ANNOTATION, MODEL_VOLUME_NAME, PEFT_MODEL_NAME_ENV,
    SERVED_MODEL_PATH_ENV, SERVING_SIDECAR_CONTAINER_NAME, TRAINING_SIDECAR_CONTAINER_NAME,
};
use ome_definitions::structs::{Container, Pod, Volume, VolumeMount};

use crate::config::ControllerConfig;

const FINE_TUNED_MOUNT_PATH: &str = "/mnt/fine-tuned";

fn strategy_subpath(strategy: FineTuneStrategy) -> &'static str {
    match strategy {
        FineTuneStrategy::Lora => "lora",
        FineTuneStrategy::Tfew => "tfew",
        FineTuneStrategy::Vanilla => "merged",
    }
}

fn pod_strategy(pod: &Pod) -> FineTuneStrategy {
    pod.metadata
        .annotation(FINE_TUNED_WEIGHT_STRATEGY_ANNOTATION)
        .and_then(|raw| FineTuneStrategy::from_str(raw).ok())
        .unwrap_or(FineTuneStrategy::Lora)
}

fn build_sidecar(pod: &Pod, name: &str, image: &str) -> Container {
    let strategy = pod_strategy(pod);
    let mut container = Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        ..Default::default()
    };
    if let Some(weight) = pod.metadata.annotation(INJECT_FINE_TUNED_ADAPTER_ANNOTATION) {
        if !weight.is_empty() && weight != "false" {
            container.set_env(PEFT_MODEL_NAME_ENV, weight);
        }
    }
    container.set_env(SERVED_MODEL_PATH_ENV, FINE_TUNED_MOUNT_PATH);
    container.volumeMounts.push(VolumeMount {
        name: MODEL_VOLUME_NAME.to_string(),
        mountPath: FINE_TUNED_MOUNT_PATH.to_string(),
        readOnly: Some(true),
        subPath: Some(strategy_subpath(strategy).to_string()),
    });
    container
}

pub fn inject_serving(pod: &mut Pod, config: &ControllerConfig) {
    if !pod
        .metadata
        .annotation_is_true(INJECT_SERVING_SIDECAR_ANNOTATION)
    {
        return;
    }
    if pod.spec.container(SERVING_SIDECAR_CONTAINER_NAME).is_some() {
        return;
    }
    let sidecar = build_sidecar(pod, SERVING_SIDECAR_CONTAINER_NAME, &config.servingSidecar.image);
    pod.spec.add_volume_if_absent(Volume::empty_dir(MODEL_VOLUME_NAME));
    pod.spec.containers.push(sidecar);
}

pub fn inject_training(pod: &mut Pod, config: &ControllerConfig) {
    if !pod
        .metadata
        .annotation_is_true(INJECT_TRAINING_SIDECAR_ANNOTATION)
    {
        return;
    }
    if pod.spec.container(TRAINING_SIDECAR_CONTAINER_NAME).is_some() {
        return;
    }
    let sidecar = build_sidecar(pod, TRAINING_SIDECAR_CONTAINER_NAME, &config.trainingSidecar.image);
    pod.spec.add_volume_if_absent(Volume::empty_dir(MODEL_VOLUME_NAME));
    pod.spec.containers.push(sidecar);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ome_definitions::structs::ObjectMeta;

    fn annotated_pod(strategy: Option<&str>) -> Pod {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("p", "default");
        pod.metadata
            .annotations
            .insert(INJECT_SERVING_SIDECAR_ANNOTATION.into(), "true".into());
        pod.metadata
            .annotations
            .insert(INJECT_FINE_TUNED_ADAPTER_ANNOTATION.into(), "support-bot".into());
        if let Some(s) = strategy {
            pod.metadata
                .annotations
                .insert(FINE_TUNED_WEIGHT_STRATEGY_ANNOTATION.into(), s.into());
        }
        pod.spec.containers.push(Container { name: "ome-container".into(), ..Default::default() });
        pod
    }

    #[test]
    fn mounts_subpath_per_strategy() {
        let config = ControllerConfig::default();
        for (strategy, subpath) in &[
            (Some("lora"), "lora"),
            (Some("tfew"), "tfew"),
            (Some("vanilla"), "merged"),
            (None, "lora"),
        ] {
            let mut pod = annotated_pod(*strategy);
            inject_serving(&mut pod, &config);
            let sidecar = pod.spec.container(SERVING_SIDECAR_CONTAINER_NAME).unwrap();
            assert_eq!(
                sidecar.volumeMounts[0].subPath.as_deref(),
                Some(*subpath),
                "strategy {:?}",
                strategy
            );
            assert_eq!(sidecar.env_value(PEFT_MODEL_NAME_ENV), Some("support-bot"));
        }
    }

    #[test]
    fn injection_is_idempotent_and_gated() {
        let config = ControllerConfig::default();
        let mut pod = annotated_pod(None);
        inject_serving(&mut pod, &config);
        let once = pod.clone();
        inject_serving(&mut pod, &config);
        assert_eq!(pod, once);

        let mut plain = Pod::default();
        plain.spec.containers.push(Container { name: "ome-container".into(), ..Default::default() });
        let before = plain.clone();
        inject_serving(&mut plain, &config);
        inject_training(&mut plain, &config);
        assert_eq!(plain, before);
    }
}
