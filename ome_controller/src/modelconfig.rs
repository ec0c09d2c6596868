//! The per-service model config map.
//!
//! The single `models.json` key holds a JSON array of
//! `{"modelName": ..., "modelSpec": ...}` entries, unique by name. Changes
//! arrive as deltas; the array is decoded into a map, patched and re-encoded,
//! so entry order carries no meaning.

use std::collections::BTreeMap;

use ome_definitions::constants::MODELS_CONFIG_KEY;
use ome_definitions::structs::ConfigMap;

use super::Result;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelEntry {
    pub modelName: String,
    pub modelSpec: serde_json::Value,
}

/// A change set: upserts keyed by model name, then removals.
#[derive(Clone, Debug, Default)]
pub struct ModelConfigDelta {
    pub updated: BTreeMap<String, serde_json::Value>,
    pub deleted: Vec<String>,
}

impl ModelConfigDelta {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.deleted.is_empty()
    }
}

// A malformed body is fatal: retrying cannot fix stored garbage.
#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum ModelConfigError {
    #[fail(display = "config map '{}' holds malformed models.json: {}", _0, _1)]
    Malformed(String, String),
}

fn decode(cm: &ConfigMap) -> Result<BTreeMap<String, serde_json::Value>> {
    let raw = match cm.data.get(MODELS_CONFIG_KEY) {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Ok(BTreeMap::new()),
    };
    let entries: Vec<ModelEntry> = serde_json::from_str(raw).map_err(|e| {
        ModelConfigError::Malformed(cm.metadata.name.clone(), e.to_string())
    })?;
    Ok(entries
        .into_iter()
        .map(|e| (e.modelName, e.modelSpec))
        .collect())
}

fn encode(models: &BTreeMap<String, serde_json::Value>) -> Result<String> {
    let entries: Vec<ModelEntry> = models
        .iter()
        .map(|(name, spec)| ModelEntry {
            modelName: name.clone(),
            modelSpec: spec.clone(),
        })
        .collect();
    Ok(serde_json::to_string(&entries)?)
}

/// Model names currently present in the config map.
///
/// Callers diff this against the desired set to build removal deltas.
pub fn model_names(cm: &ConfigMap) -> Result<Vec<String>> {
    Ok(decode(cm)?.keys().cloned().collect())
}

/// Apply a delta to the config map in place.
///
/// Upserts run before removals; removing an absent name is not an error.
pub fn process(cm: &mut ConfigMap, delta: &ModelConfigDelta) -> Result<()> {
    if delta.is_empty() {
        return Ok(());
    }
    let mut models = decode(cm)?;
    for (name, spec) in &delta.updated {
        models.insert(name.clone(), spec.clone());
    }
    for name in &delta.deleted {
        if models.remove(name).is_none() {
            info!("model {} was already absent from {}", name, cm.metadata.name);
        }
    }
    cm.data.insert(MODELS_CONFIG_KEY.to_string(), encode(&models)?);
    Ok(())
}
