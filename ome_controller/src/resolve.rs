//! Model and runtime resolution.
//!
//! Namespace-scoped records shadow cluster-scoped ones of the same name.
//! Runtime selection is a weighted search over auto-selectable format
//! entries; it reads the store but never writes, so it is safe to call from
//! admission and from every reconcile pass.

use std::collections::BTreeMap;

use ome_definitions::runtime::ServingRuntimeSpec;
use ome_definitions::{BaseModel, BaseModelSpec, ClusterBaseModel, ClusterServingRuntime, ServingRuntime};

use super::store::Store;
use super::Result;

// All main errors that can happen during resolution
#[derive(Debug)]
struct ResolveError {
    inner: Context<ResolutionErrorKind>,
}

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ResolutionErrorKind {
    #[fail(display = "base model '{}' not found", _0)]
    ModelNotFound(String),

    #[fail(display = "base model '{}' is disabled", _0)]
    ModelDisabled(String),

    #[fail(display = "runtime '{}' not found", _0)]
    RuntimeNotFound(String),

    #[fail(display = "runtime '{}' does not support model '{}'", _0, _1)]
    RuntimeIncompatible(String, String),

    #[fail(display = "no supporting runtime for model '{}'", _0)]
    NoSupportingRuntime(String),
}
use failure::{Backtrace, Context, Fail};
use std::fmt::{self, Display};

// boilerplate error wrapping (might go away)
impl Fail for ResolveError {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}
impl Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.inner, f)
    }
}
impl ResolveError {
    pub fn kind(&self) -> &ResolutionErrorKind {
        self.inner.get_context()
    }
}
impl From<ResolutionErrorKind> for ResolveError {
    fn from(kind: ResolutionErrorKind) -> ResolveError {
        ResolveError { inner: Context::new(kind) }
    }
}

/// The resolution error kind carried by an error, if it is one.
pub fn resolution_error_kind(e: &super::Error) -> Option<&ResolutionErrorKind> {
    e.downcast_ref::<ResolveError>().map(|r| r.kind())
}

/// Scope the model reference resolved against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelScope {
    Namespace,
    Cluster,
}

impl ModelScope {
    /// Kind string recorded on the InferenceService model reference.
    pub fn ref_kind(self) -> &'static str {
        match self {
            ModelScope::Namespace => "BaseModel",
            ModelScope::Cluster => "ClusterBaseModel",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub name: String,
    pub scope: ModelScope,
    pub spec: BaseModelSpec,
}

#[derive(Clone, Debug)]
pub struct ResolvedRuntime {
    pub name: String,
    pub spec: ServingRuntimeSpec,
}

/// Look up a model by name: namespace record first, cluster record fallback.
///
/// A disabled model resolves to `ModelDisabled` rather than falling through
/// to a same-named cluster record.
pub fn resolve_model<S: Store>(store: &S, namespace: &str, name: &str) -> Result<ResolvedModel> {
    if let Some(m) = store.try_get::<BaseModel>(namespace, name)? {
        if m.spec.is_disabled() {
            return Err(ResolveError::from(ResolutionErrorKind::ModelDisabled(name.to_string())).into());
        }
        return Ok(ResolvedModel {
            name: name.to_string(),
            scope: ModelScope::Namespace,
            spec: m.spec,
        });
    }
    if let Some(m) = store.try_get::<ClusterBaseModel>("", name)? {
        if m.spec.is_disabled() {
            return Err(ResolveError::from(ResolutionErrorKind::ModelDisabled(name.to_string())).into());
        }
        return Ok(ResolvedModel {
            name: name.to_string(),
            scope: ModelScope::Cluster,
            spec: m.spec,
        });
    }
    Err(ResolveError::from(ResolutionErrorKind::ModelNotFound(name.to_string())).into())
}

/// All visible runtimes: namespace-scoped ones shadow cluster-scoped ones
/// with the same name.
fn candidate_runtimes<S: Store>(
    store: &S,
    namespace: &str,
) -> Result<BTreeMap<String, ServingRuntimeSpec>> {
    let mut candidates = BTreeMap::new();
    for rt in store.list::<ClusterServingRuntime>("")? {
        candidates.insert(rt.metadata.name.clone(), rt.spec);
    }
    for rt in store.list::<ServingRuntime>(namespace)? {
        candidates.insert(rt.metadata.name.clone(), rt.spec);
    }
    Ok(candidates)
}

/// Best score among a runtime's auto-selectable matching formats.
fn best_match(spec: &ServingRuntimeSpec, model: &BaseModelSpec) -> Option<i64> {
    spec.supportedModelFormats
        .iter()
        .filter(|f| f.auto_selectable() && f.matches(model))
        .map(|f| f.score())
        .max()
}

/// Search all visible runtimes for the best compatible one.
///
/// Score is weight x priority of the matched format entry; ties break on
/// runtime name ascending. Disabled runtimes never participate.
pub fn select_runtime<S: Store>(
    store: &S,
    namespace: &str,
    model: &ResolvedModel,
) -> Result<ResolvedRuntime> {
    let mut best: Option<(i64, String, ServingRuntimeSpec)> = None;
    // BTreeMap iteration is name-ascending, so strictly-greater keeps the
    // first name on score ties
    for (name, spec) in candidate_runtimes(store, namespace)? {
        if spec.is_disabled() {
            continue;
        }
        if let Some(score) = best_match(&spec, &model.spec) {
            debug!("runtime {} matches {} with score {}", name, model.name, score);
            let better = match best {
                Some((best_score, _, _)) => score > best_score,
                None => true,
            };
            if better {
                best = Some((score, name, spec));
            }
        }
    }
    match best {
        Some((_, name, spec)) => Ok(ResolvedRuntime { name, spec }),
        None => Err(ResolveError::from(ResolutionErrorKind::NoSupportingRuntime(
            model.name.clone(),
        ))
        .into()),
    }
}

/// Check a named runtime against a model.
///
/// Unlike `select_runtime`, explicit selection does not require
/// `autoSelect`; the user asked for this runtime, compatibility is enough.
pub fn validate_runtime<S: Store>(
    store: &S,
    namespace: &str,
    runtime_name: &str,
    model: &ResolvedModel,
) -> Result<ResolvedRuntime> {
    let candidates = candidate_runtimes(store, namespace)?;
    let spec = match candidates.get(runtime_name) {
        Some(spec) => spec.clone(),
        None => {
            return Err(ResolveError::from(ResolutionErrorKind::RuntimeNotFound(
                runtime_name.to_string(),
            ))
            .into());
        }
    };
    let compatible = spec
        .supportedModelFormats
        .iter()
        .any(|f| f.matches(&model.spec));
    if !compatible {
        return Err(ResolveError::from(ResolutionErrorKind::RuntimeIncompatible(
            runtime_name.to_string(),
            model.name.clone(),
        ))
        .into());
    }
    Ok(ResolvedRuntime {
        name: runtime_name.to_string(),
        spec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use ome_definitions::basemodel::ModelFormat;
    use ome_definitions::runtime::SupportedModelFormat;
    use ome_definitions::structs::ObjectMeta;

    fn base_model(name: &str, ns: &str, disabled: bool) -> BaseModel {
        BaseModel {
            metadata: ObjectMeta::named(name, ns),
            spec: BaseModelSpec {
                modelFormat: ModelFormat {
                    name: "safetensors".into(),
                    version: Some("1.0".into()),
                    weight: None,
                },
                modelArchitecture: Some("LlamaForCausalLM".into()),
                disabled: if disabled { Some(true) } else { None },
                ..Default::default()
            },
        }
    }

    fn runtime(name: &str, weight: i64, priority: i64, auto: bool) -> ClusterServingRuntime {
        ClusterServingRuntime {
            metadata: ObjectMeta::named(name, ""),
            spec: ServingRuntimeSpec {
                supportedModelFormats: vec![SupportedModelFormat {
                    name: "safetensors".into(),
                    version: Some("*".into()),
                    weight: Some(weight),
                    priority: Some(priority),
                    autoSelect: Some(auto),
                    ..Default::default()
                }],
                ..Default::default()
            },
        }
    }

    #[test]
    fn namespace_model_shadows_cluster_model() {
        let store = MemStore::new();
        store.create(&base_model("llama-7b", "default", false)).unwrap();
        let cluster = ClusterBaseModel {
            metadata: ObjectMeta::named("llama-7b", ""),
            spec: BaseModelSpec::default(),
        };
        store.create(&cluster).unwrap();

        let resolved = resolve_model(&store, "default", "llama-7b").unwrap();
        assert_eq!(resolved.scope, ModelScope::Namespace);
        assert_eq!(resolved.scope.ref_kind(), "BaseModel");
    }

    #[test]
    fn cluster_model_is_the_fallback() {
        let store = MemStore::new();
        let cluster = ClusterBaseModel {
            metadata: ObjectMeta::named("llama-7b", ""),
            spec: base_model("llama-7b", "", false).spec,
        };
        store.create(&cluster).unwrap();

        let resolved = resolve_model(&store, "default", "llama-7b").unwrap();
        assert_eq!(resolved.scope, ModelScope::Cluster);
        assert_eq!(resolved.scope.ref_kind(), "ClusterBaseModel");
    }

    #[test]
    fn missing_and_disabled_models_fail_with_kinds() {
        let store = MemStore::new();
        let err = resolve_model(&store, "default", "nope").unwrap_err();
        match resolution_error_kind(&err) {
            Some(ResolutionErrorKind::ModelNotFound(name)) => assert_eq!(name, "nope"),
            other => panic!("wrong kind: {:?}", other),
        }

        store.create(&base_model("off", "default", true)).unwrap();
        let err = resolve_model(&store, "default", "off").unwrap_err();
        match resolution_error_kind(&err) {
            Some(ResolutionErrorKind::ModelDisabled(name)) => assert_eq!(name, "off"),
            other => panic!("wrong kind: {:?}", other),
        }
    }

    #[test]
    fn selection_prefers_highest_score_then_name() {
        let store = MemStore::new();
        store.create(&base_model("llama-7b", "default", false)).unwrap();
        store.create(&runtime("zeta", 10, 1, true)).unwrap();
        store.create(&runtime("alpha", 5, 2, true)).unwrap();
        store.create(&runtime("beta", 10, 1, true)).unwrap();

        let model = resolve_model(&store, "default", "llama-7b").unwrap();
        let selected = select_runtime(&store, "default", &model).unwrap();
        // alpha and beta tie at 10; beta and zeta tie too -- first name wins
        assert_eq!(selected.name, "alpha");
    }

    #[test]
    fn non_auto_select_entries_are_ignored() {
        let store = MemStore::new();
        store.create(&base_model("llama-7b", "default", false)).unwrap();
        store.create(&runtime("manual", 100, 1, false)).unwrap();

        let model = resolve_model(&store, "default", "llama-7b").unwrap();
        let err = select_runtime(&store, "default", &model).unwrap_err();
        match resolution_error_kind(&err) {
            Some(ResolutionErrorKind::NoSupportingRuntime(_)) => (),
            other => panic!("wrong kind: {:?}", other),
        }

        // but explicit validation accepts it
        let validated = validate_runtime(&store, "default", "manual", &model).unwrap();
        assert_eq!(validated.name, "manual");
    }

    #[test]
    fn validate_runtime_reports_incompatibility() {
        let store = MemStore::new();
        store.create(&base_model("llama-7b", "default", false)).unwrap();
        let mut rt = runtime("onnx-only", 1, 1, true);
        rt.spec.supportedModelFormats[0].name = "onnx".into();
        store.create(&rt).unwrap();

        let model = resolve_model(&store, "default", "llama-7b").unwrap();
        let err = validate_runtime(&store, "default", "onnx-only", &model).unwrap_err();
        match resolution_error_kind(&err) {
            Some(ResolutionErrorKind::RuntimeIncompatible(rt, m)) => {
                assert_eq!(rt, "onnx-only");
                assert_eq!(m, "llama-7b");
            }
            other => panic!("wrong kind: {:?}", other),
        }

        let err = validate_runtime(&store, "default", "ghost", &model).unwrap_err();
        match resolution_error_kind(&err) {
            Some(ResolutionErrorKind::RuntimeNotFound(_)) => (),
            other => panic!("wrong kind: {:?}", other),
        }
    }
}
