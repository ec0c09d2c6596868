//! Capacity reservation validation.
//!
//! A pure sum-check over the reservations listed at admission time. It is
//! deliberately lock-free and therefore racy against concurrent admissions;
//! the reconciler that places workloads re-checks at apply time.

use std::collections::BTreeMap;

use ome_definitions::capacity::{CapacityPool, CapacityReservation};

use super::store::Store;
use super::Result;

#[derive(Clone, Eq, PartialEq, Debug, Fail)]
pub enum CapacityError {
    #[fail(display = "No resource groups specified")]
    NoResourceGroups,

    #[fail(display = "Insufficient resources: {} of flavor {} over capacity", _0, _1)]
    InsufficientResources(String, String),
}

/// Requested totals per `(flavor, resource)` across a set of reservations.
fn requested_totals<'a, I>(reservations: I) -> BTreeMap<(String, String), u64>
where
    I: IntoIterator<Item = &'a CapacityReservation>,
{
    let mut totals = BTreeMap::new();
    for reservation in reservations {
        for group in &reservation.spec.resourceGroups {
            for (resource, quantity) in &group.resources {
                let entry = totals
                    .entry((group.flavor.clone(), resource.clone()))
                    .or_insert(0u64);
                *entry = entry.saturating_add(*quantity);
            }
        }
    }
    totals
}

/// Validate one incoming reservation against existing ones and the pool.
///
/// An update replaces the stored copy of itself, so a same-named existing
/// reservation is excluded from the sum.
pub fn validate_reservation(
    existing: &[CapacityReservation],
    incoming: &CapacityReservation,
    pool: &CapacityPool,
) -> Result<()> {
    if incoming.spec.resourceGroups.is_empty() {
        return Err(CapacityError::NoResourceGroups.into());
    }
    let others = existing
        .iter()
        .filter(|r| r.metadata.name != incoming.metadata.name);
    let totals = requested_totals(others.chain(std::iter::once(incoming)));
    for ((flavor, resource), total) in totals {
        let available = pool.available(&flavor, &resource);
        if total > available {
            debug!(
                "capacity check failed: {}/{} requested {} of {}",
                flavor, resource, total, available
            );
            return Err(CapacityError::InsufficientResources(resource, flavor).into());
        }
    }
    Ok(())
}

/// Admission entry point: list the stored reservations and check.
pub fn validate_incoming<S: Store>(
    store: &S,
    incoming: &CapacityReservation,
    pool: &CapacityPool,
) -> Result<()> {
    let existing = store.list::<CapacityReservation>("")?;
    validate_reservation(&existing, incoming, pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ome_definitions::capacity::ResourceGroup;
    use ome_definitions::structs::ObjectMeta;

    fn reservation(name: &str, flavor: &str, gpus: u64) -> CapacityReservation {
        let mut resources = BTreeMap::new();
        resources.insert("nvidia.com/gpu".to_string(), gpus);
        CapacityReservation {
            metadata: ObjectMeta::named(name, ""),
            spec: ome_definitions::capacity::CapacityReservationSpec {
                resourceGroups: vec![ResourceGroup { flavor: flavor.to_string(), resources }],
            },
        }
    }

    fn pool(flavor: &str, gpus: u64) -> CapacityPool {
        let mut resources = BTreeMap::new();
        resources.insert("nvidia.com/gpu".to_string(), gpus);
        let mut flavors = BTreeMap::new();
        flavors.insert(flavor.to_string(), resources);
        CapacityPool { flavors }
    }

    #[test]
    fn accepts_within_capacity() {
        let existing = vec![reservation("a", "H100", 8)];
        let incoming = reservation("b", "H100", 8);
        assert!(validate_reservation(&existing, &incoming, &pool("H100", 16)).is_ok());
    }

    #[test]
    fn rejects_over_capacity() {
        let existing = vec![reservation("a", "H100", 8)];
        let incoming = reservation("b", "H100", 9);
        let err = validate_reservation(&existing, &incoming, &pool("H100", 16)).unwrap_err();
        match err.downcast_ref::<CapacityError>() {
            Some(CapacityError::InsufficientResources(resource, flavor)) => {
                assert_eq!(resource, "nvidia.com/gpu");
                assert_eq!(flavor, "H100");
            }
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[test]
    fn unknown_flavor_has_zero_capacity() {
        let incoming = reservation("a", "A100", 1);
        assert!(validate_reservation(&[], &incoming, &pool("H100", 16)).is_err());
    }

    #[test]
    fn rejects_empty_reservation() {
        let incoming = CapacityReservation {
            metadata: ObjectMeta::named("empty", ""),
            ..Default::default()
        };
        let err = validate_reservation(&[], &incoming, &pool("H100", 16)).unwrap_err();
        match err.downcast_ref::<CapacityError>() {
            Some(CapacityError::NoResourceGroups) => (),
            other => panic!("wrong error: {:?}", other),
        }
    }

    #[test]
    fn update_replaces_its_own_prior_claim() {
        let existing = vec![reservation("a", "H100", 16)];
        // shrinking the same reservation must not double-count
        let incoming = reservation("a", "H100", 12);
        assert!(validate_reservation(&existing, &incoming, &pool("H100", 16)).is_ok());
    }
}
