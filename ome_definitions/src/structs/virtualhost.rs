use super::meta::ObjectMeta;

/// The user-facing route object for an InferenceService.
///
/// The gateway implementation is an external collaborator; the control plane
/// only writes this record. `hosts` holds anchored regexes produced by
/// `names::host_regex`, so the gateway accepts both short and fully-qualified
/// cluster-local forms.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct VirtualHost {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: VirtualHostSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct VirtualHostSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub backend: BackendRef,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct BackendRef {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub port: u32,
}
