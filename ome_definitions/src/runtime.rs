use crate::basemodel::BaseModelSpec;
use crate::structs::{ObjectMeta, PodSpec, RunnerSpec};
use crate::version::Version;

/// A namespace-scoped serving runtime.
///
/// A runtime is a template describing how to run a family of models: the pod
/// shape, the runner image and the model formats it supports. Runtimes are
/// matched against models during resolution; only formats marked
/// `autoSelect: true` participate.
///
/// ```yaml
/// metadata:
///   name: vllm-runtime
/// spec:
///   supportedModelFormats:
///   - name: safetensors
///     version: "1.0"
///     autoSelect: true
///     weight: 10
///   podSpec:
///     containers:
///     - name: ome-container
///       image: vllm:0.5.0
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ServingRuntime {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServingRuntimeSpec,
}

/// The cluster-scoped variant, visible from every namespace.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct ClusterServingRuntime {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ServingRuntimeSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServingRuntimeSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supportedModelFormats: Vec<SupportedModelFormat>,

    /// Baseline pod template for the engine component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podSpec: Option<PodSpec>,

    /// Per-component overlays for disaggregated deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engineConfig: Option<ComponentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoderConfig: Option<ComponentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routerConfig: Option<ComponentConfig>,

    /// Leader and worker pod templates for multi-node topologies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader: Option<ComponentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<ComponentConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

impl ServingRuntimeSpec {
    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }
}

/// Pod-level overlay for one component of a runtime.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub podSpec: Option<PodSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<RunnerSpec>,
}

/// One model format a runtime supports.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SupportedModelFormat {
    pub name: String,

    /// Exact version required, or `*` for any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,

    /// Only auto-selectable entries participate in runtime search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoSelect: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
}

/// Format names compare case-insensitively with `_` and `-` collapsed.
fn normalize_format_name(name: &str) -> String {
    name.to_lowercase().replace('_', "-")
}

impl SupportedModelFormat {
    /// Whether this entry matches the given model spec.
    ///
    /// The format name must match after normalisation. A declared version
    /// must equal the model's (under `Version` ordering) or be `*`; a model
    /// without a version cannot satisfy a versioned entry. A declared
    /// architecture must equal the model's exactly.
    pub fn matches(&self, model: &BaseModelSpec) -> bool {
        if normalize_format_name(&self.name) != normalize_format_name(&model.modelFormat.name) {
            return false;
        }
        if let Some(ref wanted) = self.version {
            if wanted != "*" {
                let model_version = match model.modelFormat.version {
                    Some(ref v) => v,
                    None => return false,
                };
                match (wanted.parse::<Version>(), model_version.parse::<Version>()) {
                    (Ok(a), Ok(b)) => {
                        if a != b {
                            return false;
                        }
                    }
                    // unparseable versions fall back to string equality
                    _ => {
                        if wanted != model_version {
                            return false;
                        }
                    }
                }
            }
        }
        if let Some(ref arch) = self.architecture {
            if model.modelArchitecture.as_ref() != Some(arch) {
                return false;
            }
        }
        true
    }

    /// Score of a match: format weight times runtime priority, both
    /// defaulting to 1.
    pub fn score(&self) -> i64 {
        self.weight.unwrap_or(1) * self.priority.unwrap_or(1)
    }

    pub fn auto_selectable(&self) -> bool {
        self.autoSelect.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basemodel::ModelFormat;

    fn model(format: &str, version: Option<&str>, arch: Option<&str>) -> BaseModelSpec {
        BaseModelSpec {
            modelFormat: ModelFormat {
                name: format.to_string(),
                version: version.map(|s| s.to_string()),
                weight: None,
            },
            modelArchitecture: arch.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn name_matching_normalizes_case_and_separators() {
        let fmt = SupportedModelFormat { name: "Safe_Tensors".into(), ..Default::default() };
        assert!(fmt.matches(&model("safe-tensors", None, None)));
        assert!(!fmt.matches(&model("onnx", None, None)));
    }

    #[test]
    fn version_matching_is_exact_or_wildcard() {
        let exact = SupportedModelFormat {
            name: "safetensors".into(),
            version: Some("1.0".into()),
            ..Default::default()
        };
        assert!(exact.matches(&model("safetensors", Some("1.0"), None)));
        // v-prefix and precision do not matter under Version equality
        assert!(exact.matches(&model("safetensors", Some("v1.0.0"), None)));
        assert!(!exact.matches(&model("safetensors", Some("1.1"), None)));
        assert!(!exact.matches(&model("safetensors", None, None)));

        let any = SupportedModelFormat {
            name: "safetensors".into(),
            version: Some("*".into()),
            ..Default::default()
        };
        assert!(any.matches(&model("safetensors", Some("9.9"), None)));
        assert!(any.matches(&model("safetensors", None, None)));
    }

    #[test]
    fn architecture_must_equal_when_declared() {
        let fmt = SupportedModelFormat {
            name: "safetensors".into(),
            architecture: Some("LlamaForCausalLM".into()),
            ..Default::default()
        };
        assert!(fmt.matches(&model("safetensors", None, Some("LlamaForCausalLM"))));
        assert!(!fmt.matches(&model("safetensors", None, Some("MistralForCausalLM"))));
        assert!(!fmt.matches(&model("safetensors", None, None)));
    }

    #[test]
    fn score_defaults_to_one() {
        let fmt = SupportedModelFormat { name: "x".into(), ..Default::default() };
        assert_eq!(fmt.score(), 1);
        let weighted = SupportedModelFormat {
            name: "x".into(),
            weight: Some(10),
            priority: Some(2),
            ..Default::default()
        };
        assert_eq!(weighted.score(), 20);
    }
}
