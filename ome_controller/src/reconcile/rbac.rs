//! RBAC triple for components that request a service account.

use ome_definitions::structs::{
    ObjectMeta, PolicyRule, Role, RoleBinding, RoleRef, ServiceAccount, Subject,
};
use ome_definitions::InferenceService;

use super::workload::{component_child_name, component_labels, EffectiveComponent};

fn rbac_metadata(isvc: &InferenceService, eff: &EffectiveComponent) -> ObjectMeta {
    let name = component_child_name(&isvc.metadata.name, eff.component);
    let mut metadata = ObjectMeta::named(&name, &isvc.metadata.namespace);
    metadata.labels = component_labels(isvc, eff.component);
    metadata.ownerReferences = vec![isvc.owner_reference()];
    metadata
}

pub fn build_service_account(isvc: &InferenceService, eff: &EffectiveComponent) -> ServiceAccount {
    ServiceAccount { metadata: rbac_metadata(isvc, eff) }
}

/// Components read their own config maps; nothing more.
pub fn build_role(isvc: &InferenceService, eff: &EffectiveComponent) -> Role {
    Role {
        metadata: rbac_metadata(isvc, eff),
        rules: vec![PolicyRule {
            apiGroups: vec!["".to_string()],
            resources: vec!["configmaps".to_string()],
            verbs: vec!["get".to_string(), "watch".to_string(), "list".to_string()],
        }],
    }
}

pub fn build_role_binding(isvc: &InferenceService, eff: &EffectiveComponent) -> RoleBinding {
    let name = component_child_name(&isvc.metadata.name, eff.component);
    let account = eff
        .service_account
        .clone()
        .unwrap_or_else(|| name.clone());
    RoleBinding {
        metadata: rbac_metadata(isvc, eff),
        roleRef: RoleRef { kind: "Role".to_string(), name },
        subjects: vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: account,
            namespace: isvc.metadata.namespace.clone(),
        }],
    }
}
