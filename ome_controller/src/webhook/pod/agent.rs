//! Download-agent environment on the main container.
//!
//! When the pod declares a storage URI, the serving container learns where
//! the weights come from and where the agent puts them. Values already set
//! on the container win; the controller may have pinned them explicitly.

use ome_definitions::constants::{
    AGENT_MODEL_SOURCE_ENV, AGENT_MODEL_STORE_DIRECTORY_ENV, STORAGE_URI_ANNOTATION,
};
use ome_definitions::structs::Pod;

use crate::config::ControllerConfig;

pub fn inject(pod: &mut Pod, config: &ControllerConfig) {
    let uri = match pod.metadata.annotation(STORAGE_URI_ANNOTATION) {
        Some(uri) => uri.to_string(),
        None => return,
    };
    let store_dir = config.modelInit.modelStoreDirectory.clone();
    if let Some(main) = pod.spec.main_container_mut() {
        main.add_env_if_absent(AGENT_MODEL_SOURCE_ENV, &uri);
        main.add_env_if_absent(AGENT_MODEL_STORE_DIRECTORY_ENV, &store_dir);
    }
}
