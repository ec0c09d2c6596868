use std::collections::BTreeMap;

/// Resource requests and limits.
///
/// Quantities stay opaque strings (`100m`, `2Gi`, `4`); the control plane only
/// ever compares or copies them, except for GPU counts which parse as plain
/// integers.
///
/// ```yaml
/// resources:
///   requests:
///     cpu: 100m
///     memory: 100Mi
///   limits:
///     nvidia.com/gpu: "8"
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct Resources<T> {
    #[serde(default = "BTreeMap::new", skip_serializing_if = "BTreeMap::is_empty")]
    pub requests: BTreeMap<String, T>,

    #[serde(default = "BTreeMap::new", skip_serializing_if = "BTreeMap::is_empty")]
    pub limits: BTreeMap<String, T>,
}
