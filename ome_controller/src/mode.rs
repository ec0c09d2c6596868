//! Deployment topology classification.

use ome_definitions::{DeploymentMode, InferenceService};

/// Derive the topology from the declared component shape.
///
/// A pinned annotation always wins (and is never overwritten). Otherwise:
/// an engine with a leader and a non-empty worker group is multi-node, a
/// decoder splits prefill from decode, and everything else takes the cluster
/// default.
pub fn classify(isvc: &InferenceService, cluster_default: DeploymentMode) -> DeploymentMode {
    if let Some(pinned) = isvc.deployment_mode_annotation() {
        return pinned;
    }
    classify_shape(isvc, cluster_default)
}

/// Classification of the bare shape, ignoring any annotation.
pub fn classify_shape(isvc: &InferenceService, cluster_default: DeploymentMode) -> DeploymentMode {
    if let Some(ref engine) = isvc.spec.engine {
        if engine.leader.is_some() && engine.worker_size() > 0 {
            return DeploymentMode::MultiNode;
        }
    }
    if isvc.spec.decoder.is_some() {
        return DeploymentMode::PDDisaggregated;
    }
    cluster_default
}

#[cfg(test)]
mod tests {
    use super::*;
    use ome_definitions::constants::DEPLOYMENT_MODE_ANNOTATION;
    use ome_definitions::structs::{ComponentSpec, LeaderSpec, WorkerSpec};

    fn with_engine(engine: ComponentSpec) -> InferenceService {
        let mut isvc = InferenceService::default();
        isvc.spec.engine = Some(engine);
        isvc
    }

    #[test]
    fn leader_and_workers_mean_multi_node() {
        let isvc = with_engine(ComponentSpec {
            leader: Some(LeaderSpec::default()),
            worker: Some(WorkerSpec { size: Some(2), ..Default::default() }),
            ..Default::default()
        });
        assert_eq!(classify(&isvc, DeploymentMode::RawDeployment), DeploymentMode::MultiNode);
    }

    #[test]
    fn zero_workers_do_not_make_a_multi_node() {
        let isvc = with_engine(ComponentSpec {
            leader: Some(LeaderSpec::default()),
            worker: Some(WorkerSpec { size: Some(0), ..Default::default() }),
            ..Default::default()
        });
        assert_eq!(
            classify(&isvc, DeploymentMode::RawDeployment),
            DeploymentMode::RawDeployment
        );
    }

    #[test]
    fn decoder_means_disaggregated() {
        let mut isvc = with_engine(ComponentSpec::default());
        isvc.spec.decoder = Some(ComponentSpec::default());
        assert_eq!(
            classify(&isvc, DeploymentMode::RawDeployment),
            DeploymentMode::PDDisaggregated
        );
        // multi-node wins over the decoder
        isvc.spec.engine = Some(ComponentSpec {
            leader: Some(LeaderSpec::default()),
            worker: Some(WorkerSpec { size: Some(4), ..Default::default() }),
            ..Default::default()
        });
        assert_eq!(classify(&isvc, DeploymentMode::RawDeployment), DeploymentMode::MultiNode);
    }

    #[test]
    fn annotation_pins_the_mode() {
        let mut isvc = with_engine(ComponentSpec::default());
        isvc.metadata
            .annotations
            .insert(DEPLOYMENT_MODE_ANNOTATION.into(), "Serverless".into());
        isvc.spec.decoder = Some(ComponentSpec::default());
        assert_eq!(classify(&isvc, DeploymentMode::RawDeployment), DeploymentMode::Serverless);
    }

    #[test]
    fn plain_shape_takes_the_cluster_default() {
        let isvc = with_engine(ComponentSpec::default());
        assert_eq!(
            classify(&isvc, DeploymentMode::RawDeployment),
            DeploymentMode::RawDeployment
        );
        assert_eq!(classify(&isvc, DeploymentMode::Serverless), DeploymentMode::Serverless);
    }
}
