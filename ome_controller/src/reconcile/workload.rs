//! Effective component specs and workload object builders.
//!
//! The serving runtime supplies the baseline pod shape; the component spec
//! overlays it. "Template merging" here is struct overlay, not text
//! templating: the runner rewrites the main container, extra containers
//! append, and scheduling fields pass through.

use ome_definitions::constants::{
    Component, ScaleMetric, BASE_MODEL_FORMAT_ANNOTATION, BASE_MODEL_FORMAT_VERSION_ANNOTATION,
    BASE_MODEL_NAME_ANNOTATION, COMPONENT_LABEL, DEFAULT_APP_METRICS_PORT,
    INFERENCESERVICE_LABEL, INJECT_MODEL_INIT_ANNOTATION, MAIN_CONTAINER_NAME, MAX_LABEL_LENGTH,
    STORAGE_URI_ANNOTATION,
};
use ome_definitions::names;
use ome_definitions::runtime::{ComponentConfig, ServingRuntimeSpec};
use ome_definitions::structs::{
    ComponentSpec, Container, Deployment, DeploymentSpec, LabelSelector, LeaderWorkerSet,
    LeaderWorkerSetSpec, LeaderWorkerTemplate, ObjectMeta, PodSpec, PodTemplateSpec,
};
use ome_definitions::InferenceService;

use crate::resolve::ResolvedModel;

use std::collections::BTreeMap;

/// A component spec with the runtime template folded in.
#[derive(Clone, Debug)]
pub struct EffectiveComponent {
    pub component: Component,
    pub min_replicas: u32,
    pub max_replicas: u32,
    pub scale_metric: ScaleMetric,
    pub scale_target: Option<u32>,
    pub min_available: Option<u32>,
    pub max_unavailable: Option<u32>,
    pub service_account: Option<String>,
    pub pod: PodSpec,
    pub leader_pod: Option<PodSpec>,
    pub worker_pod: Option<PodSpec>,
    pub worker_size: u32,
    pub port: u32,
}

/// Child object name for a component, bounded to label length.
pub fn component_child_name(isvc: &str, component: Component) -> String {
    names::truncate_name(&names::child_name(isvc, component), MAX_LABEL_LENGTH)
}

/// Selector labels shared by a component's workload, service and PDB.
pub fn component_labels(isvc: &InferenceService, component: Component) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(INFERENCESERVICE_LABEL.to_string(), isvc.metadata.name.clone());
    labels.insert(COMPONENT_LABEL.to_string(), component.as_str().to_string());
    labels
}

fn runtime_component_config<'a>(
    runtime: Option<&'a ServingRuntimeSpec>,
    component: Component,
) -> Option<&'a ComponentConfig> {
    let runtime = runtime?;
    match component {
        Component::Engine => runtime.engineConfig.as_ref(),
        Component::Decoder => runtime.decoderConfig.as_ref(),
        Component::Router => runtime.routerConfig.as_ref(),
        Component::Predictor => None,
    }
}

/// Base pod for a component: the per-component overlay when the runtime has
/// one, else the runtime's shared pod spec, else empty.
fn base_pod(runtime: Option<&ServingRuntimeSpec>, component: Component) -> PodSpec {
    if let Some(cfg) = runtime_component_config(runtime, component) {
        if let Some(ref pod) = cfg.podSpec {
            return pod.clone();
        }
    }
    runtime
        .and_then(|r| r.podSpec.clone())
        .unwrap_or_default()
}

fn ensure_main_container(pod: &mut PodSpec) {
    if pod.main_container().is_none() {
        pod.containers.push(Container {
            name: MAIN_CONTAINER_NAME.to_string(),
            ..Default::default()
        });
    }
}

/// Fold runtime template and component spec into one effective component.
pub fn effective_component(
    component: Component,
    spec: &ComponentSpec,
    runtime: Option<&ServingRuntimeSpec>,
) -> EffectiveComponent {
    let mut pod = base_pod(runtime, component);
    ensure_main_container(&mut pod);

    if let Some(cfg) = runtime_component_config(runtime, component) {
        if let Some(ref runner) = cfg.runner {
            if let Some(main) = pod.main_container_mut() {
                runner.apply_to(main);
            }
        }
    }
    if let Some(ref runner) = spec.runner {
        if let Some(main) = pod.main_container_mut() {
            runner.apply_to(main);
        }
    }
    for extra in &spec.containers {
        if pod.container(&extra.name).is_none() {
            pod.containers.push(extra.clone());
        }
    }
    if spec.serviceAccountName.is_some() {
        pod.serviceAccountName = spec.serviceAccountName.clone();
    }

    let worker_size = spec.worker_size();
    let (leader_pod, worker_pod) = if spec.leader.is_some() && worker_size > 0 {
        let mut leader = runtime
            .and_then(|r| r.leader.as_ref())
            .and_then(|c| c.podSpec.clone())
            .unwrap_or_else(|| pod.clone());
        ensure_main_container(&mut leader);
        if let Some(runner) = spec.leader.as_ref().and_then(|l| l.runner.as_ref()) {
            if let Some(main) = leader.main_container_mut() {
                runner.apply_to(main);
            }
        }
        let mut worker = runtime
            .and_then(|r| r.worker.as_ref())
            .and_then(|c| c.podSpec.clone())
            .unwrap_or_else(|| pod.clone());
        ensure_main_container(&mut worker);
        if let Some(runner) = spec.worker.as_ref().and_then(|w| w.runner.as_ref()) {
            if let Some(main) = worker.main_container_mut() {
                runner.apply_to(main);
            }
        }
        (Some(leader), Some(worker))
    } else {
        (None, None)
    };

    let port = pod
        .main_container()
        .and_then(|c| c.ports.first())
        .map(|p| p.containerPort)
        .unwrap_or(DEFAULT_APP_METRICS_PORT);

    let (min_default, max_default) = match component {
        Component::Router => (1, 2),
        _ => (1, 3),
    };

    EffectiveComponent {
        component,
        min_replicas: spec.minReplicas.unwrap_or(min_default),
        max_replicas: spec.maxReplicas.unwrap_or(max_default),
        scale_metric: spec.scaleMetric.unwrap_or(ScaleMetric::Cpu),
        scale_target: spec.scaleTarget,
        min_available: spec.minAvailable,
        max_unavailable: spec.maxUnavailable,
        // the runtime template may request an account too
        service_account: spec
            .serviceAccountName
            .clone()
            .or_else(|| pod.serviceAccountName.clone()),
        pod,
        leader_pod,
        worker_pod,
        worker_size,
        port,
    }
}

/// Annotations the pod webhook consumes, derived from the resolved model.
pub fn model_annotations(model: Option<&ResolvedModel>) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    if let Some(model) = model {
        annotations.insert(BASE_MODEL_NAME_ANNOTATION.to_string(), model.name.clone());
        annotations.insert(
            BASE_MODEL_FORMAT_ANNOTATION.to_string(),
            model.spec.modelFormat.name.clone(),
        );
        if let Some(ref version) = model.spec.modelFormat.version {
            annotations.insert(BASE_MODEL_FORMAT_VERSION_ANNOTATION.to_string(), version.clone());
        }
        if let Some(ref storage) = model.spec.storage {
            annotations.insert(STORAGE_URI_ANNOTATION.to_string(), storage.storageUri.clone());
            annotations.insert(INJECT_MODEL_INIT_ANNOTATION.to_string(), "true".to_string());
        }
    }
    annotations
}

fn pod_template(
    isvc: &InferenceService,
    component: Component,
    pod: &PodSpec,
    model: Option<&ResolvedModel>,
) -> PodTemplateSpec {
    let mut metadata = ObjectMeta::default();
    metadata.labels = component_labels(isvc, component);
    metadata.annotations = model_annotations(model);
    PodTemplateSpec { metadata, spec: pod.clone() }
}

pub fn build_deployment(
    isvc: &InferenceService,
    eff: &EffectiveComponent,
    model: Option<&ResolvedModel>,
) -> Deployment {
    let name = component_child_name(&isvc.metadata.name, eff.component);
    let mut metadata = ObjectMeta::named(&name, &isvc.metadata.namespace);
    metadata.labels = component_labels(isvc, eff.component);
    metadata.ownerReferences = vec![isvc.owner_reference()];
    Deployment {
        metadata,
        spec: DeploymentSpec {
            replicas: Some(eff.min_replicas),
            selector: LabelSelector { matchLabels: component_labels(isvc, eff.component) },
            template: pod_template(isvc, eff.component, &eff.pod, model),
        },
    }
}

pub fn build_leader_worker_set(
    isvc: &InferenceService,
    eff: &EffectiveComponent,
    model: Option<&ResolvedModel>,
) -> LeaderWorkerSet {
    let name = names::lws_name(&isvc.metadata.name);
    let mut metadata = ObjectMeta::named(&name, &isvc.metadata.namespace);
    metadata.labels = component_labels(isvc, eff.component);
    metadata.ownerReferences = vec![isvc.owner_reference()];
    let leader = eff.leader_pod.clone().unwrap_or_else(|| eff.pod.clone());
    let worker = eff.worker_pod.clone().unwrap_or_else(|| eff.pod.clone());
    LeaderWorkerSet {
        metadata,
        spec: LeaderWorkerSetSpec {
            replicas: Some(eff.min_replicas),
            leaderWorkerTemplate: LeaderWorkerTemplate {
                // size counts the leader plus its workers
                size: eff.worker_size + 1,
                leaderTemplate: pod_template(isvc, eff.component, &leader, model),
                workerTemplate: pod_template(isvc, eff.component, &worker, None),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ome_definitions::structs::{LeaderSpec, RunnerSpec, WorkerSpec};

    fn runtime_with_image(image: &str) -> ServingRuntimeSpec {
        ServingRuntimeSpec {
            podSpec: Some(PodSpec {
                containers: vec![Container {
                    name: MAIN_CONTAINER_NAME.into(),
                    image: Some(image.into()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn runner_overrides_runtime_image() {
        let runtime = runtime_with_image("runtime:v1");
        let spec = ComponentSpec {
            runner: Some(RunnerSpec { image: Some("user:v2".into()), ..Default::default() }),
            ..Default::default()
        };
        let eff = effective_component(Component::Engine, &spec, Some(&runtime));
        assert_eq!(
            eff.pod.main_container().unwrap().image.as_deref(),
            Some("user:v2")
        );
    }

    #[test]
    fn runtime_image_survives_without_runner_override() {
        let runtime = runtime_with_image("runtime:v1");
        let eff = effective_component(Component::Engine, &ComponentSpec::default(), Some(&runtime));
        assert_eq!(
            eff.pod.main_container().unwrap().image.as_deref(),
            Some("runtime:v1")
        );
    }

    #[test]
    fn engine_config_overlay_wins_over_shared_pod_spec() {
        let mut runtime = runtime_with_image("runtime:v1");
        runtime.engineConfig = Some(ComponentConfig {
            podSpec: Some(PodSpec {
                containers: vec![Container {
                    name: MAIN_CONTAINER_NAME.into(),
                    image: Some("engine-overlay:v1".into()),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            runner: None,
        });
        let eff = effective_component(Component::Engine, &ComponentSpec::default(), Some(&runtime));
        assert_eq!(
            eff.pod.main_container().unwrap().image.as_deref(),
            Some("engine-overlay:v1")
        );
        // the decoder still sees the shared pod spec
        let eff = effective_component(Component::Decoder, &ComponentSpec::default(), Some(&runtime));
        assert_eq!(
            eff.pod.main_container().unwrap().image.as_deref(),
            Some("runtime:v1")
        );
    }

    #[test]
    fn multi_node_shape_builds_leader_and_worker_pods() {
        let runtime = runtime_with_image("runtime:v1");
        let spec = ComponentSpec {
            leader: Some(LeaderSpec::default()),
            worker: Some(WorkerSpec { size: Some(2), ..Default::default() }),
            ..Default::default()
        };
        let eff = effective_component(Component::Engine, &spec, Some(&runtime));
        assert_eq!(eff.worker_size, 2);
        assert!(eff.leader_pod.is_some());
        assert!(eff.worker_pod.is_some());

        let isvc = InferenceService {
            metadata: ObjectMeta::named("svc", "default"),
            ..Default::default()
        };
        let lws = build_leader_worker_set(&isvc, &eff, None);
        assert_eq!(lws.metadata.name, "lws-svc");
        assert_eq!(lws.spec.leaderWorkerTemplate.size, 3);
    }

    #[test]
    fn deployment_carries_selector_and_owner() {
        let mut isvc = InferenceService {
            metadata: ObjectMeta::named("svc", "default"),
            ..Default::default()
        };
        isvc.metadata.uid = Some("uid-1".into());
        let eff = effective_component(Component::Engine, &ComponentSpec::default(), None);
        let dep = build_deployment(&isvc, &eff, None);
        assert_eq!(dep.metadata.name, "svc-engine");
        assert_eq!(dep.spec.replicas, Some(1));
        assert_eq!(
            dep.spec.selector.matchLabels.get(COMPONENT_LABEL).map(|s| s.as_str()),
            Some("engine")
        );
        assert_eq!(dep.metadata.ownerReferences[0].uid, "uid-1");
    }
}
