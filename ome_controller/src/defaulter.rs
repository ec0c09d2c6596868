//! Admission-time defaulting and legacy predictor migration.
//!
//! Every step is idempotent: admitting an already-defaulted service changes
//! nothing. The migration moves a legacy `predictor` block into the
//! `engine`/`model`/`runtime` triple by explicit field-by-field copy (the
//! original implementation round-tripped through JSON; the shapes here are
//! static, so the copy is spelled out).

use ome_definitions::constants::{
    Component, DeploymentMode, DEPLOYMENT_MODE_ANNOTATION, DEPRECATION_WARNING_ANNOTATION,
    MAIN_CONTAINER_NAME,
};
use ome_definitions::structs::{ComponentSpec, RunnerSpec};
use ome_definitions::{InferenceService, ModelRef, RuntimeRef};

use super::config::ControllerConfig;
use super::mode::classify_shape;
use super::resolve::{self, resolution_error_kind};
use super::store::Store;
use super::Result;

/// The literal warning attached to migrated services.
pub const DEPRECATION_MESSAGE: &str =
    "predictor is deprecated and has been migrated to engine/model/runtime; \
     it will be removed in a future release";

pub struct Defaulter<'a, S: Store> {
    pub store: &'a S,
    pub config: &'a ControllerConfig,
}

impl<'a, S: Store> Defaulter<'a, S> {
    pub fn new(store: &'a S, config: &'a ControllerConfig) -> Defaulter<'a, S> {
        Defaulter { store, config }
    }

    /// Run every defaulting step in order. Returns user-facing warnings.
    pub fn apply(&self, isvc: &mut InferenceService) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        self.default_mode_annotation_early(isvc);

        if self.config.enablePredictorMigration {
            self.migrate_predictor(isvc)?;
        }

        if isvc.spec.predictor.is_some() {
            self.attach_deprecation_warning(isvc, &mut warnings);
        }

        self.classify_mode(isvc);
        self.default_component_replicas(isvc);

        Ok(warnings)
    }

    /// Step (a): a cluster defaulting to RawDeployment stamps services that
    /// carry no mode annotation; any other default stays ambient.
    fn default_mode_annotation_early(&self, isvc: &mut InferenceService) {
        if isvc.metadata.annotation(DEPLOYMENT_MODE_ANNOTATION).is_some() {
            return;
        }
        if self.config.defaultDeploymentMode == DeploymentMode::RawDeployment {
            isvc.metadata.annotations.insert(
                DEPLOYMENT_MODE_ANNOTATION.to_string(),
                DeploymentMode::RawDeployment.to_string(),
            );
        }
    }

    /// Step (b): move a populated legacy predictor into the engine.
    fn migrate_predictor(&self, isvc: &mut InferenceService) -> Result<()> {
        if isvc.spec.engine.is_some() {
            return Ok(());
        }
        let predictor = match isvc.spec.predictor {
            Some(ref p) if p.is_populated() => p.clone(),
            _ => return Ok(()),
        };
        info!("migrating legacy predictor of {}", isvc.metadata.name);

        let mut engine = ComponentSpec {
            // (b.i) componentExtension fields copy across bit-for-bit
            minReplicas: predictor.minReplicas,
            maxReplicas: predictor.maxReplicas,
            scaleMetric: predictor.scaleMetric,
            scaleTarget: predictor.scaleTarget,
            containerConcurrency: predictor.containerConcurrency,
            ..Default::default()
        };

        // (b.ii) pick the runner container: exact name, then substring, then
        // first
        if !predictor.containers.is_empty() {
            let chosen = predictor
                .containers
                .iter()
                .position(|c| c.name == MAIN_CONTAINER_NAME)
                .or_else(|| {
                    predictor
                        .containers
                        .iter()
                        .position(|c| c.name.contains("ome"))
                })
                .unwrap_or(0);
            engine.runner = Some(RunnerSpec::from_container(&predictor.containers[chosen]));
            engine.containers = predictor
                .containers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != chosen)
                .map(|(_, c)| c.clone())
                .collect();
        }

        // (b.iii) the worker block copies as-is
        if predictor.worker.is_some() {
            engine.worker = predictor.worker.clone();
        }

        // (b.iv) resolve the base model to pin its scope
        if let Some(ref model) = predictor.model {
            if let Some(ref base_model) = model.baseModel {
                if isvc.spec.model.is_none() {
                    let resolved =
                        resolve::resolve_model(self.store, &isvc.metadata.namespace, base_model);
                    match resolved {
                        Ok(resolved) => {
                            isvc.spec.model = Some(ModelRef {
                                name: base_model.clone(),
                                kind: Some(resolved.scope.ref_kind().to_string()),
                                fineTunedWeights: model.fineTunedWeights.clone(),
                            });
                        }
                        Err(ref e) if resolution_error_kind(e).is_some() => {
                            // the validator reports unresolvable models;
                            // migration still records the reference
                            warn!("predictor model {} did not resolve: {}", base_model, e);
                            isvc.spec.model = Some(ModelRef {
                                name: base_model.clone(),
                                kind: None,
                                fineTunedWeights: model.fineTunedWeights.clone(),
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            // (b.v) the runtime reference copies when unset
            if let Some(ref runtime) = model.runtime {
                if isvc.spec.runtime.is_none() {
                    isvc.spec.runtime = Some(RuntimeRef { name: runtime.clone() });
                }
            }
        }

        isvc.spec.engine = Some(engine);
        Ok(())
    }

    /// Step (c): surface the deprecation once.
    fn attach_deprecation_warning(&self, isvc: &mut InferenceService, warnings: &mut Vec<String>) {
        if isvc.metadata.annotation(DEPRECATION_WARNING_ANNOTATION).is_none() {
            isvc.metadata.annotations.insert(
                DEPRECATION_WARNING_ANNOTATION.to_string(),
                DEPRECATION_MESSAGE.to_string(),
            );
        }
        warnings.push(DEPRECATION_MESSAGE.to_string());
    }

    /// Step (d): classify and stamp the mode, overwriting nothing.
    fn classify_mode(&self, isvc: &mut InferenceService) {
        if isvc.metadata.annotation(DEPLOYMENT_MODE_ANNOTATION).is_some() {
            return;
        }
        let mode = classify_shape(isvc, self.config.defaultDeploymentMode);
        isvc.metadata
            .annotations
            .insert(DEPLOYMENT_MODE_ANNOTATION.to_string(), mode.to_string());
    }

    /// Step (e): replica bounds per component, preserving user values.
    fn default_component_replicas(&self, isvc: &mut InferenceService) {
        for component in &[Component::Engine, Component::Decoder, Component::Router] {
            let (min_default, max_default) = match component {
                Component::Router => (1, 2),
                _ => (1, 3),
            };
            let spec = match component {
                Component::Engine => isvc.spec.engine.as_mut(),
                Component::Decoder => isvc.spec.decoder.as_mut(),
                Component::Router => isvc.spec.router.as_mut(),
                Component::Predictor => None,
            };
            if let Some(spec) = spec {
                if spec.minReplicas.is_none() {
                    spec.minReplicas = Some(min_default);
                }
                if spec.maxReplicas.is_none() {
                    spec.maxReplicas = Some(max_default);
                }
            }
        }
    }
}
