//! Admission-time validation of InferenceServices.
//!
//! Checks run in a fixed order and stop at the first failure; the result is a
//! 400-class rejection. Validation never writes: runtime auto-selection here
//! only produces a warning naming the choice.

use std::str::FromStr;

use regex::Regex;

use ome_definitions::constants::{
    AutoscalerClass, ScaleMetric, AUTOSCALER_CLASS_ANNOTATION, METRICS_ANNOTATION,
    TARGET_UTILIZATION_ANNOTATION,
};
use ome_definitions::InferenceService;

use super::config::ControllerConfig;
use super::resolve;
use super::store::Store;
use super::Result;

// All admission rejections, mirrored to the client as 400s
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ValidationError {
    #[fail(display = "invalid service name '{}': use lower case alphanumerics and dashes", _0)]
    InvalidName(String),

    #[fail(display = "invalid autoscaler class '{}': must be hpa, keda or external", _0)]
    InvalidAutoscaler(String),

    #[fail(display = "invalid autoscaler metric '{}': hpa supports cpu and memory", _0)]
    InvalidMetric(String),

    #[fail(display = "invalid target utilization '{}': must be an integer in [1,100]", _0)]
    InvalidUtilization(String),

    #[fail(display = "decoder requires an engine")]
    DecoderWithoutEngine,

    #[fail(display = "a model reference is required when no runtime is set and the engine has no complete runner")]
    ModelOrRuntimeRequired,
}

pub struct Validator<'a, S: Store> {
    pub store: &'a S,
    pub config: &'a ControllerConfig,
}

impl<'a, S: Store> Validator<'a, S> {
    pub fn new(store: &'a S, config: &'a ControllerConfig) -> Validator<'a, S> {
        Validator { store, config }
    }

    /// Validate one service; returns warnings on success.
    pub fn validate(&self, isvc: &InferenceService) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        self.check_name(isvc)?;
        self.check_autoscaler_annotations(isvc)?;
        self.check_target_utilization(isvc)?;
        self.check_component_shape(isvc)?;
        self.check_model_requirement(isvc, &mut warnings)?;

        Ok(warnings)
    }

    fn check_name(&self, isvc: &InferenceService) -> Result<()> {
        // 63 is the kube dns limit; the reconciler budgets a suffix for
        // component names, so the regex stays permissive on length
        let re = Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").unwrap();
        if !re.is_match(&isvc.metadata.name) {
            return Err(ValidationError::InvalidName(isvc.metadata.name.clone()).into());
        }
        Ok(())
    }

    fn check_autoscaler_annotations(&self, isvc: &InferenceService) -> Result<()> {
        let class = match isvc.metadata.annotation(AUTOSCALER_CLASS_ANNOTATION) {
            Some(raw) => match AutoscalerClass::from_str(raw) {
                Ok(class) => class,
                Err(_) => return Err(ValidationError::InvalidAutoscaler(raw.to_string()).into()),
            },
            None => return Ok(()),
        };
        if class == AutoscalerClass::Hpa {
            if let Some(raw) = isvc.metadata.annotation(METRICS_ANNOTATION) {
                if ScaleMetric::from_str(raw).is_err() {
                    return Err(ValidationError::InvalidMetric(raw.to_string()).into());
                }
            }
        }
        Ok(())
    }

    fn check_target_utilization(&self, isvc: &InferenceService) -> Result<()> {
        if let Some(raw) = isvc.metadata.annotation(TARGET_UTILIZATION_ANNOTATION) {
            match raw.parse::<i64>() {
                Ok(v) if v >= 1 && v <= 100 => (),
                _ => return Err(ValidationError::InvalidUtilization(raw.to_string()).into()),
            }
        }
        Ok(())
    }

    fn check_component_shape(&self, isvc: &InferenceService) -> Result<()> {
        if isvc.spec.decoder.is_some() && isvc.spec.engine.is_none() {
            return Err(ValidationError::DecoderWithoutEngine.into());
        }
        Ok(())
    }

    /// An engine without a runtime and without a complete runner needs a
    /// model, and the model must actually resolve.
    fn check_model_requirement(
        &self,
        isvc: &InferenceService,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let engine = match isvc.spec.engine {
            Some(ref engine) => engine,
            None => return Ok(()),
        };
        if isvc.spec.runtime.is_some() || engine.has_complete_runner() {
            if let Some(ref model_ref) = isvc.spec.model {
                // still resolve an explicit pairing so incompatibilities fail
                // at admission rather than at reconcile
                if let Some(ref runtime_ref) = isvc.spec.runtime {
                    let model =
                        resolve::resolve_model(self.store, &isvc.metadata.namespace, &model_ref.name)?;
                    resolve::validate_runtime(
                        self.store,
                        &isvc.metadata.namespace,
                        &runtime_ref.name,
                        &model,
                    )?;
                }
            }
            return Ok(());
        }

        let model_ref = match isvc.spec.model {
            Some(ref m) => m,
            None => return Err(ValidationError::ModelOrRuntimeRequired.into()),
        };

        let model = resolve::resolve_model(self.store, &isvc.metadata.namespace, &model_ref.name)?;
        let selected = resolve::select_runtime(self.store, &isvc.metadata.namespace, &model)?;
        warnings.push(format!(
            "runtime '{}' was auto-selected for model '{}'",
            selected.name, model.name
        ));
        Ok(())
    }
}
