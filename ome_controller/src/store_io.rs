//! YAML-backed store loading for the CLI.
//!
//! A store directory holds one object per YAML file, each carrying a `kind`
//! field naming its type. Loading walks the directory tree and inserts every
//! parseable object; unknown kinds are an error so typos in fixtures do not
//! silently vanish.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use walkdir::WalkDir;

use ome_definitions::structs::{
    ConfigMap, Deployment, HorizontalPodAutoscaler, LeaderWorkerSet, Pod, PodDisruptionBudget,
    Role, RoleBinding, Service, ServiceAccount, VirtualHost,
};
use ome_definitions::{
    BaseModel, CapacityReservation, ClusterBaseModel, ClusterServingRuntime, DedicatedAICluster,
    FineTunedWeight, InferenceService, ServingRuntime,
};

use super::store::{Kind, MemStore, Object, Store};
use super::Result;

fn convert<T: DeserializeOwned>(value: &serde_yaml::Value) -> Result<T> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

fn insert<T: Object>(store: &MemStore, value: &serde_yaml::Value) -> Result<()> {
    let object: T = convert(value)?;
    store.create(&object)?;
    Ok(())
}

/// Load one YAML document into the store.
pub fn load_value(store: &MemStore, value: &serde_yaml::Value) -> Result<()> {
    let kind_str = value
        .get("kind")
        .and_then(|k| k.as_str())
        .ok_or_else(|| format_err!("object carries no kind field"))?;
    let kind = Kind::from_str_opt(kind_str)
        .ok_or_else(|| format_err!("unknown kind '{}'", kind_str))?;

    // the kind field is envelope only; the typed structs do not carry it
    let mut value = value.clone();
    if let serde_yaml::Value::Mapping(ref mut map) = value {
        map.remove(&serde_yaml::Value::String("kind".to_string()));
        map.remove(&serde_yaml::Value::String("apiVersion".to_string()));
    }

    match kind {
        Kind::InferenceService => insert::<InferenceService>(store, &value),
        Kind::BaseModel => insert::<BaseModel>(store, &value),
        Kind::ClusterBaseModel => insert::<ClusterBaseModel>(store, &value),
        Kind::ServingRuntime => insert::<ServingRuntime>(store, &value),
        Kind::ClusterServingRuntime => insert::<ClusterServingRuntime>(store, &value),
        Kind::FineTunedWeight => insert::<FineTunedWeight>(store, &value),
        Kind::DedicatedAICluster => insert::<DedicatedAICluster>(store, &value),
        Kind::CapacityReservation => insert::<CapacityReservation>(store, &value),
        Kind::Deployment => insert::<Deployment>(store, &value),
        Kind::LeaderWorkerSet => insert::<LeaderWorkerSet>(store, &value),
        Kind::Service => insert::<Service>(store, &value),
        Kind::HorizontalPodAutoscaler => insert::<HorizontalPodAutoscaler>(store, &value),
        Kind::PodDisruptionBudget => insert::<PodDisruptionBudget>(store, &value),
        Kind::VirtualHost => insert::<VirtualHost>(store, &value),
        Kind::ConfigMap => insert::<ConfigMap>(store, &value),
        Kind::ServiceAccount => insert::<ServiceAccount>(store, &value),
        Kind::Role => insert::<Role>(store, &value),
        Kind::RoleBinding => insert::<RoleBinding>(store, &value),
        Kind::Pod => insert::<Pod>(store, &value),
        Kind::PersistentVolumeClaim => {
            bail!("persistent volume claims are not loadable fixtures")
        }
    }
}

/// Load every `.yml`/`.yaml` file under `dir` into the store.
pub fn load_dir(store: &MemStore, dir: &Path) -> Result<usize> {
    let mut loaded = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "yml" || e == "yaml")
            .unwrap_or(false);
        if !is_yaml {
            continue;
        }
        let mut body = String::new();
        File::open(path)?.read_to_string(&mut body)?;
        // files may hold several documents separated by ---
        for raw in body.split("\n---") {
            if raw.trim().is_empty() {
                continue;
            }
            let value: serde_yaml::Value = serde_yaml::from_str(raw)?;
            load_value(store, &value)
                .map_err(|e| format_err!("{}: {}", path.display(), e))?;
            loaded += 1;
        }
    }
    debug!("loaded {} objects from {}", loaded, dir.display());
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_typed_objects_by_kind() {
        let store = MemStore::new();
        let doc = r#"
kind: ClusterBaseModel
metadata:
  name: llama-7b
spec:
  modelFormat:
    name: safetensors
"#;
        let value: serde_yaml::Value = serde_yaml::from_str(doc).unwrap();
        load_value(&store, &value).unwrap();
        let model: ClusterBaseModel = store.get("", "llama-7b").unwrap();
        assert_eq!(model.spec.modelFormat.name, "safetensors");
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let store = MemStore::new();
        let value: serde_yaml::Value =
            serde_yaml::from_str("kind: Gadget\nmetadata:\n  name: x\n").unwrap();
        assert!(load_value(&store, &value).is_err());
    }
}
