use std::collections::BTreeMap;

use super::meta::ObjectMeta;
use super::pod::PodTemplateSpec;

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub matchLabels: BTreeMap<String, String>,
}

/// A single-node workload with independent replicas.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Deployment {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DeploymentSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct DeploymentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub selector: LabelSelector,
    #[serde(default)]
    pub template: PodTemplateSpec,
}

/// A gang-scheduled leader plus N workers, replicated as a unit.
///
/// Used for multi-node inference where one model shard spans several hosts;
/// the platform schedules each replica's leader and workers together.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct LeaderWorkerSet {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: LeaderWorkerSetSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct LeaderWorkerSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<u32>,
    #[serde(default)]
    pub leaderWorkerTemplate: LeaderWorkerTemplate,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct LeaderWorkerTemplate {
    /// Pods per replica, leader included.
    #[serde(default)]
    pub size: u32,
    #[serde(default)]
    pub leaderTemplate: PodTemplateSpec,
    #[serde(default)]
    pub workerTemplate: PodTemplateSpec,
}
