//! The pod mutation pipeline.
//!
//! Injectors run in a fixed order, each keyed off its own annotation, and
//! every one is idempotent: re-admitting an already-mutated pod changes
//! nothing. The only cross-injector constraint is ordering: the model-init
//! container must run before the fine-tuned adapter, which the final
//! stable re-ordering guarantees regardless of which injectors fired.

use ome_definitions::constants::{
    FINE_TUNED_ADAPTER_CONTAINER_NAME, INFERENCESERVICE_LABEL, MODEL_INIT_CONTAINER_NAME,
    TRAINING_JOB_LABEL,
};
use ome_definitions::structs::{Pod, PodSpec};

use crate::config::ControllerConfig;
use crate::store::Store;
use crate::Result;

/// Download-agent env for the main container
pub mod agent;
/// Queue-proxy metrics aggregation and scrape annotations
pub mod metrics;
/// The model-init init container
pub mod modelinit;
/// The fine-tuned adapter init container
pub mod finetuned;
/// Serving and training sidecars
pub mod sidecar;
/// RDMA profile injection
pub mod rdma;
/// Dedicated-cluster scheduling overlay
pub mod scheduling;

pub struct PodMutator<'a, S: Store> {
    pub store: &'a S,
    pub config: &'a ControllerConfig,
}

impl<'a, S: Store> PodMutator<'a, S> {
    /// Run the pipeline; returns false when the pod is not ours.
    pub fn mutate(&self, pod: &mut Pod) -> Result<bool> {
        let ours = pod.metadata.label(INFERENCESERVICE_LABEL).is_some()
            || pod.metadata.label(TRAINING_JOB_LABEL).is_some();
        if !ours {
            debug!("pod {} carries no ome label, skipping", pod.metadata.name);
            return Ok(false);
        }

        agent::inject(pod, self.config);
        metrics::inject(pod);
        modelinit::inject(pod, self.config);
        finetuned::inject(self.store, pod, self.config)?;
        sidecar::inject_serving(pod, self.config);
        sidecar::inject_training(pod, self.config);
        rdma::inject(pod, self.config);
        scheduling::inject(self.store, pod, self.config)?;

        order_init_containers(&mut pod.spec);
        Ok(true)
    }
}

/// Move the model-init container ahead of the fine-tuned adapter, keeping
/// every other relative order.
pub fn order_init_containers(spec: &mut PodSpec) {
    let model_init = spec
        .initContainers
        .iter()
        .position(|c| c.name == MODEL_INIT_CONTAINER_NAME);
    let adapter = spec
        .initContainers
        .iter()
        .position(|c| c.name == FINE_TUNED_ADAPTER_CONTAINER_NAME);
    if let (Some(mi), Some(ft)) = (model_init, adapter) {
        if ft < mi {
            let container = spec.initContainers.remove(mi);
            spec.initContainers.insert(ft, container);
        }
    }
}
