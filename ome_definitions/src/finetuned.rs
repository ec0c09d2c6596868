use crate::constants::FineTuneStrategy;
use crate::storage::StorageSpec;
use crate::structs::ObjectMeta;

/// A cluster-scoped fine-tuned weight record.
///
/// Either a derived adapter (lora, tfew) or a merged-weight blob produced
/// from a base model. The pod webhook fetches these to build the
/// fine-tuned-adapter init container.
///
/// ```yaml
/// metadata:
///   name: llama-7b-support-bot
/// spec:
///   baseModel: llama-7b
///   fineTuneStrategy: lora
///   storage:
///     storageUri: oci://n/idtenancy/b/weights/o/support-bot
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct FineTunedWeight {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: FineTunedWeightSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FineTunedWeightSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseModel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fineTuneStrategy: Option<FineTuneStrategy>,

    /// Merged weights live under a `merged_model/` suffix of the prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mergedWeights: Option<bool>,

    #[serde(default)]
    pub storage: StorageSpec,
}

impl FineTunedWeightSpec {
    pub fn strategy(&self) -> FineTuneStrategy {
        self.fineTuneStrategy.unwrap_or(FineTuneStrategy::Lora)
    }

    pub fn uses_merged_weights(&self) -> bool {
        self.mergedWeights.unwrap_or(false)
    }
}
