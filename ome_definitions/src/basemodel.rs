use crate::storage::StorageSpec;
use crate::structs::ObjectMeta;

/// A namespace-scoped base model record.
///
/// ```yaml
/// metadata:
///   name: llama-7b
///   namespace: default
/// spec:
///   modelFormat:
///     name: safetensors
///     version: "1.0"
///   modelArchitecture: LlamaForCausalLM
///   modelParameterSize: 7B
///   storage:
///     storageUri: oci://n/idtenancy/b/models/o/llama-7b
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct BaseModel {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BaseModelSpec,
}

/// The cluster-scoped variant, visible from every namespace.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ClusterBaseModel {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: BaseModelSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BaseModelSpec {
    #[serde(default)]
    pub modelFormat: ModelFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelArchitecture: Option<String>,

    /// Human-readable parameter count (`7B`, `70B`); informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modelParameterSize: Option<String>,

    /// A disabled model may never be selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageSpec>,
}

impl BaseModelSpec {
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

/// The serialisation format of the model weights.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelFormat {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Informational only; runtime scoring reads the weight on the
    /// runtime's supported-format entry, not this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}
