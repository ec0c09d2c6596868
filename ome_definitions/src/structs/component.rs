use super::container::Container;
use super::pod::Volume;
use super::resources::Resources;
use crate::constants::{ScaleMetric, MAIN_CONTAINER_NAME};

/// Specification of one component (engine, decoder or router).
///
/// A component describes the pods that run it plus the scaling and
/// availability extension fields. Most fields are optional: the selected
/// serving runtime supplies the baseline pod shape and the component overlays
/// it.
///
/// ```yaml
/// engine:
///   runner:
///     image: vllm:0.5.0
///   minReplicas: 1
///   maxReplicas: 3
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    /// The container that executes the model. Overlays the runtime's main
    /// container; a complete runner (with image) can stand alone without a
    /// runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerSpec>,

    /// Leader pod override for multi-node topologies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<LeaderSpec>,

    /// Worker pods for multi-node topologies. A worker size above zero
    /// switches the component to a leader-worker set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerSpec>,

    /// Extra containers appended verbatim to the pod.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minReplicas: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxReplicas: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleMetric: Option<ScaleMetric>,

    /// Target value for the scale metric, in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleTarget: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containerConcurrency: Option<u32>,

    /// Disruption budget overrides; `maxUnavailable=1` when both unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minAvailable: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxUnavailable: Option<u32>,

    /// Requesting a service account provisions the RBAC triple for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serviceAccountName: Option<String>,
}

impl ComponentSpec {
    /// Worker size, zero when no worker block is present.
    pub fn worker_size(&self) -> u32 {
        self.worker.as_ref().and_then(|w| w.size).unwrap_or(0)
    }

    /// True when the component can run without a serving runtime: either the
    /// runner carries an image, or both leader and worker runners do.
    pub fn has_complete_runner(&self) -> bool {
        let runner_image = |r: &Option<RunnerSpec>| {
            r.as_ref().and_then(|r| r.image.as_ref()).is_some()
        };
        if runner_image(&self.runner) {
            return true;
        }
        let leader = self
            .leader
            .as_ref()
            .map(|l| runner_image(&l.runner))
            .unwrap_or(false);
        let worker = self
            .worker
            .as_ref()
            .map(|w| runner_image(&w.runner))
            .unwrap_or(false);
        leader && worker
    }
}

/// The runner container override.
///
/// Shaped like a container but with everything optional; unset fields fall
/// through to the runtime template.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunnerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<super::container::EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources<String>>,
}

impl RunnerSpec {
    /// Build a runner from an existing container, preserving its shape.
    pub fn from_container(c: &Container) -> RunnerSpec {
        RunnerSpec {
            name: Some(c.name.clone()),
            image: c.image.clone(),
            command: c.command.clone(),
            args: c.args.clone(),
            env: c.env.clone(),
            resources: c.resources.clone(),
        }
    }

    /// Overlay this runner onto a container in place.
    pub fn apply_to(&self, c: &mut Container) {
        if let Some(ref image) = self.image {
            c.image = Some(image.clone());
        }
        if !self.command.is_empty() {
            c.command = self.command.clone();
        }
        if !self.args.is_empty() {
            c.args = self.args.clone();
        }
        for e in &self.env {
            c.set_env(&e.name, &e.value);
        }
        if let Some(ref res) = self.resources {
            c.resources = Some(res.clone());
        }
    }

    /// Materialise a standalone container from this runner.
    pub fn to_container(&self) -> Container {
        let mut c = Container {
            name: self
                .name
                .clone()
                .unwrap_or_else(|| MAIN_CONTAINER_NAME.to_string()),
            ..Default::default()
        };
        self.apply_to(&mut c);
        c
    }
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LeaderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerSpec>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerSpec>,
}

/// The legacy predictor block.
///
/// Deprecated; admitted only so the defaulter can migrate it into the
/// `engine`/`model`/`runtime` triple. New manifests must not use it.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PredictorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<PredictorModel>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<Container>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minReplicas: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxReplicas: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleMetric: Option<ScaleMetric>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleTarget: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub containerConcurrency: Option<u32>,
}

impl PredictorSpec {
    pub fn is_populated(&self) -> bool {
        self.model.is_some() || !self.containers.is_empty() || self.worker.is_some()
    }
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PredictorModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseModel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fineTunedWeights: Vec<String>,
}
