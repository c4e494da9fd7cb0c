// Stop sequence alignment between an operator's stop list and the
// reference feed's ordering of the same route.
//
// Operator feeds list stops in topological order and the servicing route
// may skip some of them, so the correspondence is recovered with dynamic
// programming: every reference stop is matched to exactly one operator
// stop, in increasing order, with operator stops allowed to be skipped in
// between.

use crate::models::{NATIVE_NAME_KEY, Stop, UNKNOWN_OPERATOR_KEY};
use geo::{Distance, Haversine};
use geo_types::Point;

#[derive(Clone, Copy, Debug)]
pub struct MatchConfig {
    /// Acceptance ceiling on the average per-stop distance, metres.
    pub max_avg_distance: f64,
    /// Weight applied to the summed index drift of an accepted alignment.
    pub drift_penalty: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            max_avg_distance: 600.0,
            drift_penalty: 0.01,
        }
    }
}

/// A monotone correspondence between two stop sequences.
#[derive(Clone, Debug, PartialEq)]
pub struct Alignment {
    /// (reference index, operator index) pairs, ascending in both coordinates.
    pub pairs: Vec<(usize, usize)>,
    /// Average matched distance plus drift penalty, lower is better.
    pub score: f64,
}

/// Maps `reference_stops` onto `operator_stops`. Returns None when the
/// sequences cannot usefully correspond: the reference side is more than
/// one stop longer, or the best average distance per reference stop is
/// over the configured ceiling.
pub fn align(
    operator_stops: &[&Stop],
    reference_stops: &[&Stop],
    operator_key: &str,
    config: &MatchConfig,
) -> Option<Alignment> {
    if operator_stops.is_empty() || reference_stops.is_empty() {
        return None;
    }

    // Operators the reference feed does not label individually share a
    // generic name entry instead.
    let name_key = match reference_stops[0].name.contains_key(operator_key) {
        true => operator_key,
        false => UNKNOWN_OPERATOR_KEY,
    };

    if reference_stops.len() > operator_stops.len() + 1 {
        return None;
    }
    // The reference feed commonly appends a terminal stop the operator
    // list omits.
    let reference_stops = match reference_stops.len() == operator_stops.len() + 1 {
        true => &reference_stops[..reference_stops.len() - 1],
        false => reference_stops,
    };

    let r_len = reference_stops.len();
    let o_len = operator_stops.len();

    let mut dist_sum = vec![vec![f64::INFINITY; o_len + 1]; r_len + 1];
    // Any of the leading surplus operator stops is a free starting point.
    for cell in dist_sum[0].iter_mut().take(o_len - r_len + 1) {
        *cell = 0.0;
    }

    for (i, reference_stop) in reference_stops.iter().enumerate() {
        for (j, operator_stop) in operator_stops.iter().enumerate() {
            let cost = stop_cost(reference_stop, operator_stop, name_key);
            dist_sum[i + 1][j + 1] = f64::min(
                dist_sum[i][j] + cost, // continue from previous stops of both sides
                dist_sum[i + 1][j],    // skip the current operator stop
            );
        }
    }

    let best_total = dist_sum[r_len]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if !(best_total / r_len as f64 < config.max_avg_distance) {
        return None;
    }

    // Walk back from the final operator stop. Within a row the table is
    // non-increasing left to right, so the last column carries the row
    // minimum and equal neighbours mark skipped operator stops.
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    let mut i = r_len;
    let mut j = o_len;
    while i > 0 && j > 0 {
        if dist_sum[i][j] == dist_sum[i][j - 1] {
            j -= 1;
        } else {
            pairs.push((i - 1, j - 1));
            i -= 1;
            j -= 1;
        }
    }
    pairs.reverse();

    // Penalty distance is given for alignments whose pairing drifts apart
    // in index space, as a tie breaker between equally close candidates.
    let drift: usize = pairs.iter().map(|(a, b)| a.abs_diff(*b)).sum();
    let score = best_total / r_len as f64 + drift as f64 * config.drift_penalty;

    Some(Alignment { pairs, score })
}

fn stop_cost(reference_stop: &Stop, operator_stop: &Stop, name_key: &str) -> f64 {
    let name_matches = match (
        operator_stop.name.get(NATIVE_NAME_KEY),
        reference_stop.name.get(name_key),
    ) {
        (Some(operator_name), Some(reference_name)) => operator_name == reference_name,
        _ => false,
    };
    if name_matches {
        return 0.0;
    }
    Haversine.distance(
        Point::new(operator_stop.lng, operator_stop.lat),
        Point::new(reference_stop.lng, reference_stop.lat),
    )
}
