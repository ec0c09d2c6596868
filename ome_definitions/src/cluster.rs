use std::collections::BTreeMap;

use crate::structs::{ObjectMeta, Toleration};

/// A dedicated AI cluster record.
///
/// Pods annotated with `ome.io/dedicated-ai-cluster` are pinned onto the
/// cluster's capacity: the scheduling injector overlays the affinity,
/// appends the tolerations, merges the node selector and tags the
/// compartment label.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct DedicatedAICluster {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DedicatedAIClusterSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DedicatedAIClusterSpec {
    /// Named scheduling profile supplying baseline affinity and tolerations;
    /// fields set here override the profile's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodeSelector: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorityClassName: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartmentId: Option<String>,
}
