use std::collections::BTreeMap;

use super::meta::ObjectMeta;

/// A plain string-keyed config map.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ConfigMap {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}
