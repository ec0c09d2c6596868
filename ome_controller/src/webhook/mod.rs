//! Admission webhooks.
//!
//! Each handler is a synchronous transform over an admission review: parse
//! the submitted object, default or validate it, and answer with either a
//! base64-encoded JSON patch or a denial. A handler never silently succeeds:
//! configuration or conversion failures reject the request outright.

use ome_definitions::structs::Pod;
use ome_definitions::{CapacityReservation, InferenceService};

use crate::capacity::{self, CapacityError};
use crate::config::ControllerConfig;
use crate::defaulter::Defaulter;
use crate::resolve::resolution_error_kind;
use crate::store::Store;
use crate::validate::{ValidationError, Validator};
use crate::Result;

/// RFC 6902 patch computation
pub mod patch;
/// The pod mutation pipeline
pub mod pod;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AdmissionReview {
    #[serde(default)]
    pub apiVersion: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AdmissionRequest {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub operation: String,
    #[serde(default)]
    pub object: serde_json::Value,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AdmissionResponse {
    #[serde(default)]
    pub uid: String,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patchType: Option<String>,
    /// Base64 of the JSON patch body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Status {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: u16,
}

fn respond(review: &AdmissionReview, response: AdmissionResponse) -> AdmissionReview {
    AdmissionReview {
        apiVersion: review.apiVersion.clone(),
        kind: review.kind.clone(),
        request: None,
        response: Some(response),
    }
}

fn allowed(uid: &str, warnings: Vec<String>) -> AdmissionResponse {
    AdmissionResponse {
        uid: uid.to_string(),
        allowed: true,
        warnings,
        ..Default::default()
    }
}

fn denied(uid: &str, code: u16, message: &str) -> AdmissionResponse {
    AdmissionResponse {
        uid: uid.to_string(),
        allowed: false,
        status: Some(Status { message: message.to_string(), code }),
        ..Default::default()
    }
}

/// User errors reject with a 400; anything else is a 500 so the client
/// retries.
fn denial_code(e: &crate::Error) -> u16 {
    if e.downcast_ref::<ValidationError>().is_some()
        || e.downcast_ref::<CapacityError>().is_some()
        || resolution_error_kind(e).is_some()
    {
        400
    } else {
        500
    }
}

fn patch_response(
    uid: &str,
    original: &serde_json::Value,
    mutated: &serde_json::Value,
    warnings: Vec<String>,
) -> Result<AdmissionResponse> {
    let mut response = allowed(uid, warnings);
    let ops = patch::diff(original, mutated);
    if !ops.is_empty() {
        response.patchType = Some("JSONPatch".to_string());
        response.patch = Some(base64::encode(&serde_json::to_vec(&ops)?));
    }
    Ok(response)
}

/// Defaulting webhook for InferenceServices.
pub fn mutate_inference_service<S: Store>(
    store: &S,
    config: &ControllerConfig,
    review: &AdmissionReview,
) -> AdmissionReview {
    let request = match review.request {
        Some(ref request) => request,
        None => return respond(review, denied("", 500, "admission review carried no request")),
    };
    let result = (|| -> Result<AdmissionResponse> {
        let mut isvc: InferenceService = serde_json::from_value(request.object.clone())?;
        let warnings = Defaulter::new(store, config).apply(&mut isvc)?;
        let mutated = serde_json::to_value(&isvc)?;
        patch_response(&request.uid, &request.object, &mutated, warnings)
    })();
    match result {
        Ok(response) => respond(review, response),
        Err(e) => respond(review, denied(&request.uid, denial_code(&e), &e.to_string())),
    }
}

/// Validating webhook for InferenceServices.
pub fn validate_inference_service<S: Store>(
    store: &S,
    config: &ControllerConfig,
    review: &AdmissionReview,
) -> AdmissionReview {
    let request = match review.request {
        Some(ref request) => request,
        None => return respond(review, denied("", 500, "admission review carried no request")),
    };
    let result = (|| -> Result<Vec<String>> {
        let isvc: InferenceService = serde_json::from_value(request.object.clone())?;
        Validator::new(store, config).validate(&isvc)
    })();
    match result {
        Ok(warnings) => respond(review, allowed(&request.uid, warnings)),
        Err(e) => respond(review, denied(&request.uid, denial_code(&e), &e.to_string())),
    }
}

/// Validating webhook for capacity reservations.
pub fn validate_capacity_reservation<S: Store>(
    store: &S,
    config: &ControllerConfig,
    review: &AdmissionReview,
) -> AdmissionReview {
    let request = match review.request {
        Some(ref request) => request,
        None => return respond(review, denied("", 500, "admission review carried no request")),
    };
    let result = (|| -> Result<()> {
        let reservation: CapacityReservation = serde_json::from_value(request.object.clone())?;
        capacity::validate_incoming(store, &reservation, &config.capacity)
    })();
    match result {
        Ok(()) => respond(review, allowed(&request.uid, Vec::new())),
        Err(e) => respond(review, denied(&request.uid, denial_code(&e), &e.to_string())),
    }
}

/// Mutating webhook for pods.
///
/// The controller configuration is re-read per admission so injector
/// settings follow the config map; a missing or malformed map fails the
/// admission rather than admitting an uninjected pod.
pub fn mutate_pod<S: Store>(store: &S, review: &AdmissionReview) -> AdmissionReview {
    let request = match review.request {
        Some(ref request) => request,
        None => return respond(review, denied("", 500, "admission review carried no request")),
    };
    let result = (|| -> Result<AdmissionResponse> {
        let config = ControllerConfig::from_store(store)?;
        let mut pod: Pod = serde_json::from_value(request.object.clone())?;
        let mutator = pod::PodMutator { store, config: &config };
        mutator.mutate(&mut pod)?;
        let mutated = serde_json::to_value(&pod)?;
        patch_response(&request.uid, &request.object, &mutated, Vec::new())
    })();
    match result {
        Ok(response) => respond(review, response),
        Err(e) => respond(review, denied(&request.uid, denial_code(&e), &e.to_string())),
    }
}
