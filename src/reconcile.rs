// Copyright Catenary Transit Initiatives
// One reconciliation pass of an operator's route list against the
// reference feed

use crate::models::{
    OperatorRoute, ReferenceRoute, ReferenceRouteId, Stop, StopId,
};
use crate::operators::OperatorProfile;
use crate::route_match::{MergeOutcome, ReconcileState, merge_reference_metadata, select_candidate};
use crate::stop_align::MatchConfig;
use ahash::AHashMap;
use log::{info, warn};
use std::collections::BTreeMap;

/// Reference feeds publish the flat fare on their first bound.
const FIRST_BOUND: &str = "1";

pub struct PassOutcome {
    /// The operator's reconciled route list, originals plus merged records.
    pub routes: Vec<OperatorRoute>,
    /// Reference route id to the operator route it matched, for the
    /// annotated reference snapshot.
    pub matched: BTreeMap<ReferenceRouteId, OperatorRoute>,
    pub unmatched: usize,
}

/// Runs one operator over every reference route, in reference key order.
pub fn reconcile_operator(
    profile: &OperatorProfile,
    mut route_list: Vec<OperatorRoute>,
    operator_stops: &AHashMap<StopId, Stop>,
    reference_routes: &BTreeMap<ReferenceRouteId, ReferenceRoute>,
    reference_stops: &AHashMap<StopId, Stop>,
    config: &MatchConfig,
) -> PassOutcome {
    let mut state = ReconcileState::default();
    let mut merged: Vec<MergeOutcome> = Vec::new();

    for (reference_id, reference) in reference_routes {
        if profile.flat_fare_applies(reference) {
            backfill_flat_fares(&mut route_list, reference_id, reference);
            continue;
        }
        if !profile.participates(reference) {
            continue;
        }

        for (bound, reference_stop_ids) in &reference.stops {
            let selected = select_candidate(
                profile,
                reference,
                reference_stop_ids,
                &route_list,
                operator_stops,
                reference_stops,
                config,
            );
            match selected {
                Some(selected) if selected.alignment.score < config.max_avg_distance => {
                    merged.push(merge_reference_metadata(
                        profile,
                        reference_id,
                        reference,
                        bound,
                        &selected,
                        operator_stops,
                        &mut state,
                    ));
                }
                _ => {
                    if profile.is_declared_member(reference) {
                        warn!(
                            "{} {} bound {}: cannot match any in reference feed",
                            profile.code, reference.route, bound
                        );
                    }
                }
            }
        }
    }

    let total = route_list.len();
    let mut unmatched = 0usize;
    let mut routes: Vec<OperatorRoute> = Vec::new();
    for (index, mut route) in route_list.into_iter().enumerate() {
        if !state.is_found(Some(index)) {
            route.co = vec![profile.code.clone()];
            unmatched += 1;
            routes.push(route);
        } else if route.fares.is_some() {
            // Consumed routes survive on their own only when they carry
            // fare data; otherwise the merged record replaces them.
            routes.push(route);
        }
    }
    info!(
        "{}: {} out of {} routes have no reference counterpart",
        profile.code, unmatched, total
    );

    if profile.appends_merged() {
        routes.extend(merged.into_iter().filter_map(|outcome| {
            // A partial record that never gained fares is a degenerate
            // leftover of its own base and is dropped.
            (outcome.full || outcome.record.fares.is_some()).then_some(outcome.record)
        }));
    }

    PassOutcome {
        routes,
        matched: state.into_matched(),
        unmatched,
    }
}

/// Copies the reference feed's flat fare onto every route pre-tagged with
/// this reference route id, one fare per inter-stop segment.
fn backfill_flat_fares(
    route_list: &mut [OperatorRoute],
    reference_id: &ReferenceRouteId,
    reference: &ReferenceRoute,
) {
    let Some(flat_fare) = reference
        .fares
        .get(FIRST_BOUND)
        .and_then(|fares| fares.first())
        .copied()
    else {
        return;
    };
    for route in route_list
        .iter_mut()
        .filter(|route| route.gtfs_id.as_ref() == Some(reference_id))
    {
        route.fares = Some(vec![flat_fare; route.stops.len().saturating_sub(1)]);
    }
}
