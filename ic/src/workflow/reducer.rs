//! Selection reducer
//!
//! Pure functions turning per-round picks into validated candidates and
//! deciding whether a round is complete.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{CandidateCatalog, IdentifiedService, Picks, ValidatedSelection, find_candidate};

/// Map picks to the full candidates they name in this round's catalog
///
/// Picks whose id is not in the catalog for that service are dropped.
pub fn resolve(picks: &Picks, catalog: &CandidateCatalog) -> ValidatedSelection {
    debug!(picks = picks.len(), services = catalog.len(), "resolve: called");
    picks
        .iter()
        .filter_map(|(service, id)| {
            let found = find_candidate(catalog, service, id);
            if found.is_none() {
                debug!(%service, %id, "resolve: pick not in catalog, dropping");
            }
            found.map(|candidate| (service.clone(), candidate.clone()))
        })
        .collect()
}

/// True iff every identified service has an entry in `selection`
///
/// Works for both picks and validated selections.
pub fn is_complete<V>(services: &[IdentifiedService], selection: &BTreeMap<String, V>) -> bool {
    services.iter().all(|s| selection.contains_key(&s.name))
}

/// Replace-by-name merge of a round's selection into the accumulated one
pub fn merge(accumulated: &ValidatedSelection, round: ValidatedSelection) -> ValidatedSelection {
    let mut merged = accumulated.clone();
    merged.extend(round);
    merged
}

/// Identified services with no entry in `selection`, in round order
pub fn unresolved<V>(services: &[IdentifiedService], selection: &BTreeMap<String, V>) -> Vec<String> {
    services
        .iter()
        .filter(|s| !selection.contains_key(&s.name))
        .map(|s| s.name.clone())
        .collect()
}

/// Initial picks for a clarification round
///
/// For each pre-validated service present in the new catalog, keep the
/// previously validated candidate if it is still offered, otherwise fall
/// back to the highest-ranked (first) candidate. Services with no
/// candidates get no pick.
pub fn prefill(pre_validated: &[String], validated: &ValidatedSelection, catalog: &CandidateCatalog) -> Picks {
    debug!(pre_validated = pre_validated.len(), "prefill: called");
    let mut picks = Picks::new();

    for service in pre_validated {
        let Some(candidates) = catalog.get(service) else {
            debug!(%service, "prefill: service not in new catalog");
            continue;
        };

        let kept = validated
            .get(service)
            .filter(|prior| candidates.iter().any(|c| c.service_id == prior.service_id))
            .map(|prior| prior.service_id.clone());

        match kept.or_else(|| candidates.first().map(|c| c.service_id.clone())) {
            Some(id) => {
                debug!(%service, %id, "prefill: picked");
                picks.insert(service.clone(), id);
            }
            None => debug!(%service, "prefill: no candidates"),
        }
    }

    picks
}
