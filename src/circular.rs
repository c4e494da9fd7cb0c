// Synthesis of round trip candidates for circular routes.
//
// Some operators publish a circular service as two one-way halves under a
// single route number, while the reference feed models it as one circular
// entity. Gluing the halves together in both orders gives the matcher two
// extra candidates to align against the circular reference sequence.

use crate::models::OperatorRoute;

/// Builds the two round trip concatenations of a route split into exactly
/// two one-way halves. Any other situation yields nothing; this is a
/// narrow heuristic for cleanly split pairs, not a loop detector.
pub fn virtual_circular_routes(
    route_list: &[OperatorRoute],
    route_number: &str,
) -> Vec<OperatorRoute> {
    let halves: Vec<&OperatorRoute> = route_list
        .iter()
        .filter(|route| route.route == route_number)
        .collect();
    if halves.len() != 2 {
        return Vec::new();
    }

    let (first, second) = (halves[0], halves[1]);
    let carries_identity =
        |route: &OperatorRoute| !route.co.is_empty() && route.service_type.is_some();
    if !carries_identity(first) || !carries_identity(second) {
        return Vec::new();
    }

    vec![round_trip(first, second), round_trip(second, first)]
}

fn round_trip(first: &OperatorRoute, second: &OperatorRoute) -> OperatorRoute {
    let mut bound = first.bound.clone();
    bound.push_str(&second.bound);

    OperatorRoute {
        route: first.route.clone(),
        co: first.co.clone(),
        bound,
        orig: first.orig.clone(),
        dest: second.dest.clone(),
        service_type: first.service_type.clone(),
        stops: first
            .stops
            .iter()
            .chain(second.stops.iter())
            .cloned()
            .collect(),
        fares: None,
        freq: None,
        jt: None,
        gtfs_id: None,
        gtfs: None,
        is_virtual: true,
    }
}
