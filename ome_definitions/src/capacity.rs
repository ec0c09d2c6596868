use std::collections::BTreeMap;

use crate::structs::ObjectMeta;

/// A cluster-scoped claim on a quota of flavored resources.
///
/// ```yaml
/// metadata:
///   name: team-a-h100
/// spec:
///   resourceGroups:
///   - flavor: BM.GPU.H100.8
///     resources:
///       nvidia.com/gpu: 16
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct CapacityReservation {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CapacityReservationSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CapacityReservationSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resourceGroups: Vec<ResourceGroup>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ResourceGroup {
    pub flavor: String,

    /// Requested quantity per resource name, as plain counts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, u64>,
}

/// Cluster-available totals per flavor and resource.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct CapacityPool {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flavors: BTreeMap<String, BTreeMap<String, u64>>,
}

impl CapacityPool {
    pub fn available(&self, flavor: &str, resource: &str) -> u64 {
        self.flavors
            .get(flavor)
            .and_then(|r| r.get(resource))
            .cloned()
            .unwrap_or(0)
    }
}
