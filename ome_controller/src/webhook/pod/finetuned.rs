//! The fine-tuned adapter init container.
//!
//! Fetches the named fine-tuned weight record, splits its storage URI into
//! object storage coordinates and mounts a second agent run after the base
//! model download.

use ome_definitions::constants::{
    AGENT_AUTH_TYPE_ENV, AGENT_LOCAL_PATH_ENV, AGENT_MODEL_NAME_ENV,
    AGENT_MODEL_STORE_DIRECTORY_ENV, AGENT_OBJECT_BUCKET_ENV, AGENT_OBJECT_NAMESPACE_ENV,
    AGENT_OBJECT_PREFIX_ENV, AGENT_REGION_ENV, FINE_TUNED_ADAPTER_CONTAINER_NAME,
    INJECT_FINE_TUNED_ADAPTER_ANNOTATION, MODEL_VOLUME_NAME,
};
use ome_definitions::finetuned::FineTunedWeight;
use ome_definitions::storage::parse_object_storage_uri;
use ome_definitions::structs::{Container, Pod, Volume, VolumeMount};

use crate::config::ControllerConfig;
use crate::store::Store;
use crate::Result;

/// Merged weights live under this suffix of the adapter prefix.
const MERGED_WEIGHTS_SUFFIX: &str = "merged_model";

pub fn inject<S: Store>(store: &S, pod: &mut Pod, config: &ControllerConfig) -> Result<()> {
    let weight_name = match pod.metadata.annotation(INJECT_FINE_TUNED_ADAPTER_ANNOTATION) {
        Some(name) if !name.is_empty() && name != "false" => name.to_string(),
        _ => return Ok(()),
    };
    if pod
        .spec
        .init_container(FINE_TUNED_ADAPTER_CONTAINER_NAME)
        .is_some()
    {
        return Ok(());
    }

    // an unknown weight record rejects the admission
    let weight: FineTunedWeight = store.get("", &weight_name)?;
    let mut coords = parse_object_storage_uri(&weight.spec.storage.storageUri)?;
    if weight.spec.uses_merged_weights() {
        coords.prefix = format!("{}/{}", coords.prefix, MERGED_WEIGHTS_SUFFIX);
    }

    let agent = &config.modelInit;
    let store_dir = agent.modelStoreDirectory.clone();
    let local_path = format!("{}/fine-tuned/{}", store_dir, weight_name);

    let mut container = Container {
        name: FINE_TUNED_ADAPTER_CONTAINER_NAME.to_string(),
        image: Some(agent.image.clone()),
        ..Default::default()
    };
    container.set_env(AGENT_AUTH_TYPE_ENV, &agent.authType);
    container.set_env(AGENT_MODEL_NAME_ENV, &weight_name);
    container.set_env(AGENT_OBJECT_NAMESPACE_ENV, &coords.namespace);
    container.set_env(AGENT_OBJECT_BUCKET_ENV, &coords.bucket);
    container.set_env(AGENT_OBJECT_PREFIX_ENV, &coords.prefix);
    container.set_env(AGENT_LOCAL_PATH_ENV, &local_path);
    container.set_env(AGENT_MODEL_STORE_DIRECTORY_ENV, &store_dir);
    container.set_env(AGENT_REGION_ENV, &agent.region);

    container.volumeMounts.push(VolumeMount {
        name: MODEL_VOLUME_NAME.to_string(),
        mountPath: store_dir,
        readOnly: None,
        subPath: None,
    });

    pod.spec.add_volume_if_absent(Volume::empty_dir(MODEL_VOLUME_NAME));
    pod.spec.initContainers.push(container);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use ome_definitions::finetuned::FineTunedWeightSpec;
    use ome_definitions::storage::StorageSpec;
    use ome_definitions::structs::ObjectMeta;

    fn weight(name: &str, merged: bool) -> FineTunedWeight {
        FineTunedWeight {
            metadata: ObjectMeta::named(name, ""),
            spec: FineTunedWeightSpec {
                mergedWeights: if merged { Some(true) } else { None },
                storage: StorageSpec {
                    storageUri: "oci://n/tenant/b/weights/o/support-bot".into(),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    fn annotated_pod(weight_name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("p", "default");
        pod.metadata
            .annotations
            .insert(INJECT_FINE_TUNED_ADAPTER_ANNOTATION.into(), weight_name.into());
        pod.spec.containers.push(Container { name: "ome-container".into(), ..Default::default() });
        pod
    }

    #[test]
    fn parses_coordinates_into_env() {
        let store = MemStore::new();
        store.create(&weight("support-bot", false)).unwrap();
        let config = ControllerConfig::default();
        let mut pod = annotated_pod("support-bot");

        inject(&store, &mut pod, &config).unwrap();
        let adapter = pod.spec.init_container(FINE_TUNED_ADAPTER_CONTAINER_NAME).unwrap();
        assert_eq!(adapter.env_value(AGENT_OBJECT_NAMESPACE_ENV), Some("tenant"));
        assert_eq!(adapter.env_value(AGENT_OBJECT_BUCKET_ENV), Some("weights"));
        assert_eq!(adapter.env_value(AGENT_OBJECT_PREFIX_ENV), Some("support-bot"));
        assert_eq!(
            adapter.env_value(AGENT_LOCAL_PATH_ENV),
            Some("/mnt/model/fine-tuned/support-bot")
        );
    }

    #[test]
    fn merged_weights_append_the_suffix() {
        let store = MemStore::new();
        store.create(&weight("merged-bot", true)).unwrap();
        let config = ControllerConfig::default();
        let mut pod = annotated_pod("merged-bot");

        inject(&store, &mut pod, &config).unwrap();
        let adapter = pod.spec.init_container(FINE_TUNED_ADAPTER_CONTAINER_NAME).unwrap();
        assert_eq!(
            adapter.env_value(AGENT_OBJECT_PREFIX_ENV),
            Some("support-bot/merged_model")
        );
    }

    #[test]
    fn unknown_weight_record_fails_the_admission() {
        let store = MemStore::new();
        let config = ControllerConfig::default();
        let mut pod = annotated_pod("ghost");
        assert!(inject(&store, &mut pod, &config).is_err());
    }
}
