//! Shared deterministic fixtures for tests: zone rows, chain networks, and
//! a fixed-arrival transit schedule stub.

use std::collections::HashMap;

use crate::network::{Network, NetworkBuilder};
use crate::transit::{StopArrival, StopId, TransitSchedule};
use crate::zones::{Coord, Polygon, Zone, ZoneId, ZoneSystem};

/// A square zone with side `size`, lower-left corner at (`x0`, `y0`).
pub fn square_zone(id: u32, x0: f64, y0: f64, size: f64) -> Zone {
    Zone::new(
        ZoneId(id),
        Polygon::rectangle(Coord::new(x0, y0), Coord::new(x0 + size, y0 + size)),
    )
}

/// `count` square zones of side `size` in a row along the x axis,
/// ids 1..=count. Centroid of zone i is at (size/2 + i*size, size/2).
pub fn zone_row(count: usize, size: f64) -> ZoneSystem {
    let zones = (0..count)
        .map(|i| square_zone(i as u32 + 1, i as f64 * size, 0.0, size))
        .collect();
    ZoneSystem::new(zones)
}

/// Bidirectional chain network with one node per [`zone_row`] centroid:
/// node i at (spacing/2 + i*spacing, spacing/2), links of length `spacing`.
pub fn chain_network(count: usize, spacing: f64, freespeed_mps: f64) -> Network {
    let mut builder = NetworkBuilder::new();
    let nodes: Vec<_> = (0..count)
        .map(|i| builder.add_node(Coord::new(spacing * 0.5 + i as f64 * spacing, spacing * 0.5)))
        .collect();
    for pair in nodes.windows(2) {
        builder.add_bidirectional(pair[0], pair[1], spacing, freespeed_mps);
    }
    builder.build()
}

/// Transit schedule stub: fixed stop locations and one fixed arrival
/// breakdown per stop, returned for any origin and departure time.
pub struct FixedTransitSchedule {
    stops: Vec<(StopId, Coord)>,
    arrivals: HashMap<StopId, StopArrival>,
}

impl FixedTransitSchedule {
    pub fn new(stops: Vec<(StopId, Coord)>) -> Self {
        Self {
            stops,
            arrivals: HashMap::new(),
        }
    }

    /// Make `stop` reachable with the given breakdown.
    pub fn set_arrival(&mut self, stop: StopId, arrival: StopArrival) {
        self.arrivals.insert(stop, arrival);
    }
}

impl TransitSchedule for FixedTransitSchedule {
    fn stop_location(&self, stop: StopId) -> Option<Coord> {
        self.stops
            .iter()
            .find(|(id, _)| *id == stop)
            .map(|&(_, coord)| coord)
    }

    fn stops_in_radius(&self, center: Coord, radius_m: f64) -> Vec<StopId> {
        self.stops
            .iter()
            .filter(|&&(_, coord)| center.distance_to(coord) <= radius_m)
            .map(|&(id, _)| id)
            .collect()
    }

    fn nearest_stop(&self, center: Coord) -> Option<StopId> {
        self.stops
            .iter()
            .min_by(|a, b| {
                center
                    .distance_to(a.1)
                    .total_cmp(&center.distance_to(b.1))
            })
            .map(|&(id, _)| id)
    }

    fn arrival_tree(&self, _origin: Coord, _departure_time_s: f64) -> HashMap<StopId, StopArrival> {
        self.arrivals.clone()
    }
}
