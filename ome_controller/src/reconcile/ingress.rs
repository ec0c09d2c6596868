//! External virtual host builder.

use ome_definitions::constants::Component;
use ome_definitions::names;
use ome_definitions::structs::{BackendRef, ObjectMeta, VirtualHost, VirtualHostSpec};
use ome_definitions::InferenceService;

use crate::config::ControllerConfig;

use super::workload::component_child_name;

/// The user-facing route: external host plus cluster-local host regexes.
///
/// Traffic lands on the router when one is declared, else on the engine.
pub fn build_virtual_host(
    isvc: &InferenceService,
    config: &ControllerConfig,
    active: &[Component],
    port: u32,
) -> VirtualHost {
    let name = &isvc.metadata.name;
    let namespace = &isvc.metadata.namespace;
    let mut metadata = ObjectMeta::named(name, namespace);
    metadata.ownerReferences = vec![isvc.owner_reference()];

    let backend_component = if active.contains(&Component::Router) {
        Component::Router
    } else {
        Component::Engine
    };
    let backend = component_child_name(name, backend_component);

    let external_host = format!("{}.{}.{}", name, namespace, config.ingressDomain);
    let local_host = format!("{}.{}.svc.{}", name, namespace, config.clusterDomain);

    VirtualHost {
        metadata,
        spec: VirtualHostSpec {
            hosts: vec![
                names::host_regex(&external_host, &config.clusterDomain),
                names::host_regex(&local_host, &config.clusterDomain),
            ],
            backend: BackendRef { service: backend, port },
        },
    }
}
