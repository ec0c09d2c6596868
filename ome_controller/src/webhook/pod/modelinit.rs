//! The model-init init container.
//!
//! Runs the download/decryption agent before the serving container starts.
//! Everything the agent needs arrives as `OME_AGENT_*` env vars assembled
//! from pod annotations and the controller configuration.

use ome_definitions::constants::{
    AGENT_AUTH_TYPE_ENV, AGENT_COMPARTMENT_ID_ENV, AGENT_DISABLE_MODEL_DECRYPTION_ENV,
    AGENT_KEY_NAME_ENV, AGENT_LOCAL_PATH_ENV, AGENT_MODEL_FRAMEWORK_ENV, AGENT_MODEL_NAME_ENV,
    AGENT_MODEL_SOURCE_ENV, AGENT_MODEL_STORE_DIRECTORY_ENV, AGENT_MODEL_TYPE_ENV,
    AGENT_NUM_OF_GPU_ENV, AGENT_REGION_ENV, AGENT_SECRET_NAME_ENV, AGENT_TENSORRTLLM_VERSION_ENV,
    AGENT_VAULT_ID_ENV, AUTH_TYPE_ANNOTATION, BASE_MODEL_DECRYPTION_KEY_ANNOTATION,
    BASE_MODEL_DECRYPTION_SECRET_ANNOTATION, BASE_MODEL_FORMAT_ANNOTATION,
    BASE_MODEL_FORMAT_VERSION_ANNOTATION, BASE_MODEL_NAME_ANNOTATION, BASE_MODEL_TYPE_ANNOTATION,
    COMPARTMENT_ID_ANNOTATION, DISABLE_MODEL_DECRYPTION_ANNOTATION, GPU_RESOURCE_NAME,
    INJECT_MODEL_INIT_ANNOTATION, MODEL_INIT_CONTAINER_NAME, MODEL_VOLUME_NAME,
    STORAGE_URI_ANNOTATION, VAULT_ID_ANNOTATION,
};
use ome_definitions::structs::{Container, Pod, Resources, Volume, VolumeMount};

use crate::config::ControllerConfig;

/// Frameworks compare with case and separators collapsed; TensorRT-LLM gets
/// special treatment because the agent builds engine plans per GPU count.
fn is_tensorrt_llm(framework: &str) -> bool {
    let normalized: String = framework
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    normalized == "tensorrtllm"
}

pub fn inject(pod: &mut Pod, config: &ControllerConfig) {
    if !pod.metadata.annotation_is_true(INJECT_MODEL_INIT_ANNOTATION) {
        return;
    }
    if pod.spec.init_container(MODEL_INIT_CONTAINER_NAME).is_some() {
        return;
    }
    let model_name = match pod.metadata.annotation(BASE_MODEL_NAME_ANNOTATION) {
        Some(name) => name.to_string(),
        None => {
            warn!(
                "pod {} requests model-init but names no base model",
                pod.metadata.name
            );
            return;
        }
    };

    let agent = &config.modelInit;
    let store_dir = agent.modelStoreDirectory.clone();
    let local_path = format!("{}/{}", store_dir, model_name);
    let annotations = pod.metadata.annotations.clone();

    let mut container = Container {
        name: MODEL_INIT_CONTAINER_NAME.to_string(),
        image: Some(agent.image.clone()),
        ..Default::default()
    };

    let auth_type = annotations
        .get(AUTH_TYPE_ANNOTATION)
        .cloned()
        .unwrap_or_else(|| agent.authType.clone());
    container.set_env(AGENT_AUTH_TYPE_ENV, &auth_type);
    if let Some(compartment) = annotations.get(COMPARTMENT_ID_ANNOTATION) {
        container.set_env(AGENT_COMPARTMENT_ID_ENV, compartment);
    }
    if let Some(vault) = annotations.get(VAULT_ID_ANNOTATION) {
        container.set_env(AGENT_VAULT_ID_ENV, vault);
    }
    if let Some(key) = annotations.get(BASE_MODEL_DECRYPTION_KEY_ANNOTATION) {
        container.set_env(AGENT_KEY_NAME_ENV, key);
    }
    if let Some(secret) = annotations.get(BASE_MODEL_DECRYPTION_SECRET_ANNOTATION) {
        container.set_env(AGENT_SECRET_NAME_ENV, secret);
    }
    container.set_env(AGENT_MODEL_NAME_ENV, &model_name);
    if let Some(model_type) = annotations.get(BASE_MODEL_TYPE_ANNOTATION) {
        container.set_env(AGENT_MODEL_TYPE_ENV, model_type);
    }
    if let Some(framework) = annotations.get(BASE_MODEL_FORMAT_ANNOTATION) {
        if is_tensorrt_llm(framework) {
            container.set_env(AGENT_MODEL_FRAMEWORK_ENV, "tensorrtllm");
            if let Some(version) = annotations.get(BASE_MODEL_FORMAT_VERSION_ANNOTATION) {
                container.set_env(AGENT_TENSORRTLLM_VERSION_ENV, version);
            }
            let gpus = pod
                .spec
                .main_container()
                .and_then(|c| c.gpu_count(GPU_RESOURCE_NAME))
                .unwrap_or(1);
            container.set_env(AGENT_NUM_OF_GPU_ENV, &gpus.to_string());
        } else {
            container.set_env(AGENT_MODEL_FRAMEWORK_ENV, framework);
        }
    }
    if let Some(uri) = annotations.get(STORAGE_URI_ANNOTATION) {
        container.set_env(AGENT_MODEL_SOURCE_ENV, uri);
    }
    container.set_env(AGENT_LOCAL_PATH_ENV, &local_path);
    container.set_env(AGENT_MODEL_STORE_DIRECTORY_ENV, &store_dir);
    container.set_env(AGENT_REGION_ENV, &agent.region);
    if let Some(disabled) = annotations.get(DISABLE_MODEL_DECRYPTION_ANNOTATION) {
        container.set_env(AGENT_DISABLE_MODEL_DECRYPTION_ENV, disabled);
    }

    let mut resources = Resources::default();
    resources.requests.insert("cpu".to_string(), agent.cpuRequest.clone());
    resources.requests.insert("memory".to_string(), agent.memoryRequest.clone());
    resources.limits.insert("cpu".to_string(), agent.cpuLimit.clone());
    resources.limits.insert("memory".to_string(), agent.memoryLimit.clone());
    container.resources = Some(resources);

    container.volumeMounts.push(VolumeMount {
        name: MODEL_VOLUME_NAME.to_string(),
        mountPath: store_dir.clone(),
        readOnly: None,
        subPath: None,
    });

    pod.spec.add_volume_if_absent(Volume::empty_dir(MODEL_VOLUME_NAME));
    if let Some(main) = pod.spec.main_container_mut() {
        if !main.has_mount(&store_dir) {
            main.volumeMounts.push(VolumeMount {
                name: MODEL_VOLUME_NAME.to_string(),
                mountPath: store_dir,
                readOnly: Some(true),
                subPath: None,
            });
        }
    }
    pod.spec.initContainers.push(container);
}
