//! Cluster-internal service builder.

use ome_definitions::structs::{ObjectMeta, Service, ServicePort, ServiceSpec};
use ome_definitions::InferenceService;

use super::workload::{component_child_name, component_labels, EffectiveComponent};

pub fn build_service(isvc: &InferenceService, eff: &EffectiveComponent) -> Service {
    let name = component_child_name(&isvc.metadata.name, eff.component);
    let mut metadata = ObjectMeta::named(&name, &isvc.metadata.namespace);
    metadata.labels = component_labels(isvc, eff.component);
    metadata.ownerReferences = vec![isvc.owner_reference()];
    Service {
        metadata,
        spec: ServiceSpec {
            selector: component_labels(isvc, eff.component),
            ports: vec![ServicePort {
                name: Some("http".to_string()),
                port: eff.port,
                targetPort: Some(eff.port),
                protocol: None,
            }],
            clusterIP: None,
        },
    }
}
