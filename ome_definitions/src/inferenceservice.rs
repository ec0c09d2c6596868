use std::str::FromStr;

use crate::constants::{Component, DeploymentMode, DEPLOYMENT_MODE_ANNOTATION};
use crate::structs::{ComponentSpec, ObjectMeta, OwnerReference, PredictorSpec};

/// The root declarative record for one inference deployment.
///
/// An InferenceService names a model, optionally a runtime, and up to three
/// component specs. The defaulter fills gaps at admission, the validator
/// rejects malformed records, and the workload reconciler materialises the
/// child objects.
///
/// ```yaml
/// metadata:
///   name: llama-chat
///   namespace: default
/// spec:
///   model:
///     name: llama-7b
///   engine:
///     minReplicas: 1
///     maxReplicas: 3
/// ```
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
pub struct InferenceService {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: InferenceServiceSpec,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InferenceServiceSpec {
    /// Reference to a base model record.
    ///
    /// Required unless the engine carries a complete runner or a runtime is
    /// named. The defaulter resolves the scope (namespace or cluster) and
    /// records it in `kind`.
    ///
    /// ```yaml
    /// model:
    ///   name: llama-7b
    /// ```
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelRef>,

    /// Explicit runtime selection; omitted, the resolver searches for a
    /// compatible runtime by weighted format matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeRef>,

    /// The main model-execution component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<ComponentSpec>,

    /// Optional prefill/decode split; only valid alongside an engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoder: Option<ComponentSpec>,

    /// Optional stateless fan-out in front of engine and decoder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<ComponentSpec>,

    /// Legacy predictor block, migrated into `engine` at admission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictor: Option<PredictorSpec>,
}

/// Reference to a base model, with its resolved scope.
#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelRef {
    pub name: String,

    /// `BaseModel` or `ClusterBaseModel`; written by the defaulter once the
    /// scope is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fineTunedWeights: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Default, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuntimeRef {
    pub name: String,
}

impl InferenceService {
    /// The pinned deployment mode, if any annotation parses.
    pub fn deployment_mode_annotation(&self) -> Option<DeploymentMode> {
        self.metadata
            .annotation(DEPLOYMENT_MODE_ANNOTATION)
            .and_then(|v| DeploymentMode::from_str(v).ok())
    }

    pub fn component(&self, component: Component) -> Option<&ComponentSpec> {
        match component {
            Component::Engine => self.spec.engine.as_ref(),
            Component::Decoder => self.spec.decoder.as_ref(),
            Component::Router => self.spec.router.as_ref(),
            Component::Predictor => None,
        }
    }

    /// Declared components, in reconcile order.
    pub fn active_components(&self) -> Vec<Component> {
        let mut active = Vec::new();
        if self.spec.engine.is_some() {
            active.push(Component::Engine);
        }
        if self.spec.decoder.is_some() {
            active.push(Component::Decoder);
        }
        if self.spec.router.is_some() {
            active.push(Component::Router);
        }
        active
    }

    /// Owner reference children carry back to this service.
    pub fn owner_reference(&self) -> OwnerReference {
        OwnerReference {
            kind: "InferenceService".to_string(),
            name: self.metadata.name.clone(),
            uid: self.metadata.uid.clone().unwrap_or_default(),
            controller: Some(true),
            blockOwnerDeletion: Some(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_manifest() {
        let yaml = r#"
metadata:
  name: svc
  namespace: default
spec:
  model:
    name: llama-7b
  engine:
    runner:
      image: "eng:v1"
"#;
        let isvc: InferenceService = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(isvc.metadata.name, "svc");
        assert_eq!(isvc.spec.model.as_ref().unwrap().name, "llama-7b");
        assert_eq!(isvc.active_components(), vec![Component::Engine]);
        assert!(isvc.spec.engine.as_ref().unwrap().has_complete_runner());
    }

    #[test]
    fn rejects_unknown_spec_fields() {
        let yaml = r#"
spec:
  engines: {}
"#;
        assert!(serde_yaml::from_str::<InferenceService>(yaml).is_err());
    }

    #[test]
    fn deployment_mode_annotation_parses() {
        let mut isvc = InferenceService::default();
        assert_eq!(isvc.deployment_mode_annotation(), None);
        isvc.metadata
            .annotations
            .insert(DEPLOYMENT_MODE_ANNOTATION.into(), "MultiNode".into());
        assert_eq!(isvc.deployment_mode_annotation(), Some(DeploymentMode::MultiNode));
    }
}
