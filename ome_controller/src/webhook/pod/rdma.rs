//! RDMA profile injection.
//!
//! High-bandwidth multi-node inference needs the NIC devices, a large shared
//! memory segment and a pile of NCCL/UCX tuning env vars. Profiles live in
//! the controller configuration; env vars iterate in name order so repeated
//! admissions produce identical pods.

use ome_definitions::constants::{
    DEFAULT_RDMA_PROFILE, MAIN_CONTAINER_NAME, RDMA_AUTO_INJECT_ANNOTATION,
    RDMA_CONTAINER_NAME_ANNOTATION, RDMA_DEVICE_MOUNT_PATH, RDMA_DEVICE_VOLUME_NAME,
    RDMA_PROFILE_ANNOTATION, RDMA_SHM_MOUNT_PATH, RDMA_SHM_VOLUME_NAME,
};
use ome_definitions::structs::{Capabilities, Pod, SecurityContext, Volume, VolumeMount};

use crate::config::ControllerConfig;

const RDMA_CAPABILITIES: &[&str] = &["IPC_LOCK", "CAP_SYS_ADMIN"];

pub fn inject(pod: &mut Pod, config: &ControllerConfig) {
    if !pod.metadata.annotation_is_true(RDMA_AUTO_INJECT_ANNOTATION) {
        return;
    }
    let profile_name = pod
        .metadata
        .annotation(RDMA_PROFILE_ANNOTATION)
        .unwrap_or(DEFAULT_RDMA_PROFILE)
        .to_string();
    let profile = match config.rdmaProfiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None => {
            warn!("pod {} names unknown rdma profile {}", pod.metadata.name, profile_name);
            return;
        }
    };
    let target = pod
        .metadata
        .annotation(RDMA_CONTAINER_NAME_ANNOTATION)
        .unwrap_or(MAIN_CONTAINER_NAME)
        .to_string();

    let container = match pod.spec.container_mut(&target) {
        Some(container) => container,
        None => {
            info!(
                "pod {} has no container {} to rdma-inject, skipping",
                pod.metadata.name, target
            );
            return;
        }
    };

    // env sorted by name via the profile map's key order
    for (name, value) in &profile.env {
        container.add_env_if_absent(name, value);
    }

    for (volume, path) in &[
        (RDMA_SHM_VOLUME_NAME, RDMA_SHM_MOUNT_PATH),
        (RDMA_DEVICE_VOLUME_NAME, RDMA_DEVICE_MOUNT_PATH),
    ] {
        if !container.has_mount(path) {
            container.volumeMounts.push(VolumeMount {
                name: volume.to_string(),
                mountPath: path.to_string(),
                readOnly: None,
                subPath: None,
            });
        }
    }

    let security = container.securityContext.get_or_insert_with(SecurityContext::default);
    security.privileged = Some(true);
    let capabilities = security.capabilities.get_or_insert_with(Capabilities::default);
    for cap in RDMA_CAPABILITIES {
        if !capabilities.add.iter().any(|c| c == cap) {
            capabilities.add.push(cap.to_string());
        }
    }

    pod.spec.add_volume_if_absent(Volume::memory_backed(RDMA_SHM_VOLUME_NAME));
    pod.spec.add_volume_if_absent(Volume::host_path(
        RDMA_DEVICE_VOLUME_NAME,
        RDMA_DEVICE_MOUNT_PATH,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use ome_definitions::structs::{Container, ObjectMeta};

    fn rdma_pod() -> Pod {
        let mut pod = Pod::default();
        pod.metadata = ObjectMeta::named("p", "default");
        pod.metadata
            .annotations
            .insert(RDMA_AUTO_INJECT_ANNOTATION.into(), "true".into());
        pod.spec.containers.push(Container { name: MAIN_CONTAINER_NAME.into(), ..Default::default() });
        pod
    }

    #[test]
    fn default_profile_injects_everything() {
        let config = ControllerConfig::default();
        let mut pod = rdma_pod();
        inject(&mut pod, &config);

        let container = pod.spec.container(MAIN_CONTAINER_NAME).unwrap();
        assert_eq!(container.env.len(), 22);
        let mut sorted = container.env.clone();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(container.env, sorted, "env vars must arrive sorted by name");

        assert_eq!(container.volumeMounts.len(), 2);
        assert!(container.has_mount(RDMA_SHM_MOUNT_PATH));
        assert!(container.has_mount(RDMA_DEVICE_MOUNT_PATH));

        let security = container.securityContext.as_ref().unwrap();
        assert_eq!(security.privileged, Some(true));
        let caps = &security.capabilities.as_ref().unwrap().add;
        assert!(caps.contains(&"IPC_LOCK".to_string()));
        assert!(caps.contains(&"CAP_SYS_ADMIN".to_string()));

        assert_eq!(pod.spec.volumes.len(), 2);
        let dshm = pod.spec.volumes.iter().find(|v| v.name == RDMA_SHM_VOLUME_NAME).unwrap();
        assert_eq!(dshm.emptyDir.as_ref().unwrap().medium.as_deref(), Some("Memory"));
        let devinf = pod.spec.volumes.iter().find(|v| v.name == RDMA_DEVICE_VOLUME_NAME).unwrap();
        assert_eq!(devinf.hostPath.as_ref().unwrap().path, RDMA_DEVICE_MOUNT_PATH);
    }

    #[test]
    fn merges_without_duplicating() {
        let config = ControllerConfig::default();
        let mut pod = rdma_pod();
        {
            let container = pod.spec.container_mut(MAIN_CONTAINER_NAME).unwrap();
            container.set_env("NCCL_DEBUG", "INFO"); // user value wins
            container.securityContext = Some(SecurityContext {
                capabilities: Some(Capabilities {
                    add: vec!["IPC_LOCK".into(), "NET_ADMIN".into()],
                    drop: vec![],
                }),
                ..Default::default()
            });
        }
        inject(&mut pod, &config);
        let once = pod.clone();
        inject(&mut pod, &config);
        assert_eq!(pod, once, "re-injection must not duplicate anything");

        let container = pod.spec.container(MAIN_CONTAINER_NAME).unwrap();
        assert_eq!(container.env_value("NCCL_DEBUG"), Some("INFO"));
        let caps = &container.securityContext.as_ref().unwrap().capabilities.as_ref().unwrap().add;
        assert_eq!(caps.iter().filter(|c| c.as_str() == "IPC_LOCK").count(), 1);
        assert!(caps.contains(&"NET_ADMIN".to_string()));
    }

    #[test]
    fn absent_target_container_is_a_no_op() {
        let config = ControllerConfig::default();
        let mut pod = rdma_pod();
        pod.metadata
            .annotations
            .insert(RDMA_CONTAINER_NAME_ANNOTATION.into(), "worker".into());
        let before = pod.clone();
        inject(&mut pod, &config);
        assert_eq!(pod, before);
    }

    #[test]
    fn unknown_profile_is_a_no_op() {
        let config = ControllerConfig::default();
        let mut pod = rdma_pod();
        pod.metadata
            .annotations
            .insert(RDMA_PROFILE_ANNOTATION.into(), "does-not-exist".into());
        let before = pod.clone();
        inject(&mut pod, &config);
        assert_eq!(pod, before);
    }
}
