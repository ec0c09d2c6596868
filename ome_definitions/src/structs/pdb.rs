use super::meta::ObjectMeta;
use super::workload::LabelSelector;

/// A constraint on voluntary evictions for one component's pods.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct PodDisruptionBudget {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodDisruptionBudgetSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct PodDisruptionBudgetSpec {
    #[serde(default)]
    pub selector: LabelSelector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minAvailable: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxUnavailable: Option<u32>,
}

impl PodDisruptionBudget {
    /// Semantic equality: selector and both bounds; metadata is not compared.
    pub fn same_spec(&self, other: &PodDisruptionBudget) -> bool {
        self.spec == other.spec
    }
}
