//! Pod disruption budget builder.

use ome_definitions::structs::{
    LabelSelector, ObjectMeta, PodDisruptionBudget, PodDisruptionBudgetSpec,
};
use ome_definitions::InferenceService;

use super::workload::{component_child_name, component_labels, EffectiveComponent};

pub fn build_pdb(isvc: &InferenceService, eff: &EffectiveComponent) -> PodDisruptionBudget {
    let name = component_child_name(&isvc.metadata.name, eff.component);
    let mut metadata = ObjectMeta::named(&name, &isvc.metadata.namespace);
    metadata.labels = component_labels(isvc, eff.component);
    metadata.ownerReferences = vec![isvc.owner_reference()];

    // explicit bounds win; otherwise tolerate one unavailable pod
    let (min_available, max_unavailable) = match (eff.min_available, eff.max_unavailable) {
        (None, None) => (None, Some(1)),
        bounds => bounds,
    };

    PodDisruptionBudget {
        metadata,
        spec: PodDisruptionBudgetSpec {
            selector: LabelSelector { matchLabels: component_labels(isvc, eff.component) },
            minAvailable: min_available,
            maxUnavailable: max_unavailable,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ome_definitions::constants::Component;
    use ome_definitions::structs::ComponentSpec;

    use crate::reconcile::workload::effective_component;

    #[test]
    fn defaults_to_one_unavailable() {
        let isvc = InferenceService {
            metadata: ObjectMeta::named("svc", "default"),
            ..Default::default()
        };
        let eff = effective_component(Component::Engine, &ComponentSpec::default(), None);
        let pdb = build_pdb(&isvc, &eff);
        assert_eq!(pdb.spec.maxUnavailable, Some(1));
        assert_eq!(pdb.spec.minAvailable, None);
    }

    #[test]
    fn explicit_bounds_win() {
        let isvc = InferenceService {
            metadata: ObjectMeta::named("svc", "default"),
            ..Default::default()
        };
        let spec = ComponentSpec { minAvailable: Some(2), ..Default::default() };
        let eff = effective_component(Component::Engine, &spec, None);
        let pdb = build_pdb(&isvc, &eff);
        assert_eq!(pdb.spec.minAvailable, Some(2));
        assert_eq!(pdb.spec.maxUnavailable, None);
    }
}
