//! Garbage collection of stale child objects.
//!
//! Cleanup walks a fixed vector of child kinds rather than reflecting over a
//! dynamic client. Only objects whose owner reference matches the service on
//! uid, kind and name are considered; name-matching alone would delete
//! adopted strangers.

use ome_definitions::constants::Component;
use ome_definitions::names;
use ome_definitions::InferenceService;

use crate::store::{is_not_found, Kind, Store};
use crate::Result;

use super::workload::component_child_name;
use super::{CheckOutcome, CheckResult};

/// Every kind the reconciler may have created for a service.
pub const CHILD_KINDS: &[Kind] = &[
    Kind::Deployment,
    Kind::Service,
    Kind::HorizontalPodAutoscaler,
    Kind::VirtualHost,
    Kind::ConfigMap,
    Kind::Role,
    Kind::RoleBinding,
    Kind::ServiceAccount,
    Kind::PersistentVolumeClaim,
    Kind::LeaderWorkerSet,
];

/// Which component a child object name belongs to, if any.
pub fn component_of(isvc_name: &str, child: &str) -> Option<Component> {
    for component in &[Component::Engine, Component::Decoder, Component::Router] {
        if child == component_child_name(isvc_name, *component) {
            return Some(*component);
        }
    }
    // the leader-worker set is the engine's workload under another name
    if child == names::lws_name(isvc_name) {
        return Some(Component::Engine);
    }
    None
}

/// Delete children of components that are no longer active.
///
/// The external virtual host follows its own rule: preserved while ingress
/// creation is disabled and at least one component stays active.
pub fn cleanup<S: Store>(
    store: &S,
    isvc: &InferenceService,
    active: &[Component],
    ingress_disabled: bool,
    checks: &mut Vec<CheckOutcome>,
) -> Result<()> {
    let owner = isvc.owner_reference();
    let namespace = &isvc.metadata.namespace;

    for kind in CHILD_KINDS {
        for meta in store.list_meta(*kind, namespace)? {
            if !meta.owned_by(&owner) {
                continue;
            }

            if *kind == Kind::VirtualHost && meta.name == isvc.metadata.name {
                let preserved = !active.is_empty() && ingress_disabled;
                if active.is_empty() {
                    delete_child(store, *kind, namespace, &meta.name, checks)?;
                } else if preserved {
                    debug!("preserving external virtual host {} while components are active", meta.name);
                }
                continue;
            }

            match component_of(&isvc.metadata.name, &meta.name) {
                Some(component) if !active.contains(&component) => {
                    delete_child(store, *kind, namespace, &meta.name, checks)?;
                }
                _ => (),
            }
        }
    }
    Ok(())
}

fn delete_child<S: Store>(
    store: &S,
    kind: Kind,
    namespace: &str,
    name: &str,
    checks: &mut Vec<CheckOutcome>,
) -> Result<()> {
    info!("deleting stale {} {}/{}", kind, namespace, name);
    match store.delete_kind(kind, namespace, name) {
        Ok(()) => {
            checks.push(CheckOutcome {
                kind,
                name: name.to_string(),
                result: CheckResult::Delete,
            });
            Ok(())
        }
        // someone else already removed it
        Err(ref e) if is_not_found(e) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_of_recognises_suffixes() {
        assert_eq!(component_of("svc", "svc-engine"), Some(Component::Engine));
        assert_eq!(component_of("svc", "svc-decoder"), Some(Component::Decoder));
        assert_eq!(component_of("svc", "svc-router"), Some(Component::Router));
        assert_eq!(component_of("svc", "lws-svc"), Some(Component::Engine));
        assert_eq!(component_of("svc", "svc"), None);
        assert_eq!(component_of("svc", "modelconfig-svc"), None);
        // another service's children never match
        assert_eq!(component_of("svc", "other-engine"), None);
    }
}
