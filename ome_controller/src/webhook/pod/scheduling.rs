//! Dedicated-cluster scheduling overlay.
//!
//! Pods referencing a dedicated AI cluster are pinned to its capacity: the
//! cluster record (optionally layered over a named profile) supplies
//! affinity, tolerations, node selectors and the priority class, and the
//! compartment label tags the pod for billing attribution.

use ome_definitions::constants::{COMPARTMENT_LABEL, DEDICATED_AI_CLUSTER_ANNOTATION};
use ome_definitions::structs::{Pod, Toleration};
use ome_definitions::DedicatedAICluster;

use crate::config::ControllerConfig;
use crate::store::Store;
use crate::Result;

fn append_tolerations(existing: &mut Vec<Toleration>, extra: &[Toleration]) {
    for toleration in extra {
        if !existing.iter().any(|t| t == toleration) {
            existing.push(toleration.clone());
        }
    }
}

pub fn inject<S: Store>(store: &S, pod: &mut Pod, config: &ControllerConfig) -> Result<()> {
    let cluster_name = match pod.metadata.annotation(DEDICATED_AI_CLUSTER_ANNOTATION) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => return Ok(()),
    };

    // a dangling reference rejects the admission
    let cluster: DedicatedAICluster = store.get("", &cluster_name)?;
    let spec = cluster.spec;

    let profile = spec
        .profile
        .as_ref()
        .and_then(|name| config.schedulingProfiles.get(name));

    // affinity overlays wholesale: the record beats the profile
    if let Some(affinity) = spec.affinity.clone().or_else(|| {
        profile.and_then(|p| p.affinity.clone())
    }) {
        pod.spec.affinity = Some(affinity);
    }

    if let Some(profile) = profile {
        append_tolerations(&mut pod.spec.tolerations, &profile.tolerations);
        for (key, value) in &profile.nodeSelector {
            pod.spec.nodeSelector.insert(key.clone(), value.clone());
        }
        if pod.spec.priorityClassName.is_none() {
            pod.spec.priorityClassName = profile.priorityClassName.clone();
        }
    }
    append_tolerations(&mut pod.spec.tolerations, &spec.tolerations);
    for (key, value) in &spec.nodeSelector {
        pod.spec.nodeSelector.insert(key.clone(), value.clone());
    }
    if let Some(priority) = spec.priorityClassName.clone() {
        pod.spec.priorityClassName = Some(priority);
    }
    if let Some(compartment) = spec.compartmentId.clone() {
        pod.metadata
            .labels
            .insert(COMPARTMENT_LABEL.to_string(), compartment);
    }
    Ok(())
}
