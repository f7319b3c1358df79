//! Transit skims: stop discovery plus one-to-many itinerary search.
//!
//! The schedule itself is a collaborator behind the [`TransitSchedule`]
//! trait: it supplies stop locations and a multi-destination arrival-tree
//! primitive. This module owns the zone-side logic: the sequential
//! [`NearbyStopIndex`] pre-step (with radius escalation), the per-origin row
//! computation, the beeline-walk comparison, and the no-schedule fallback
//! configuration.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SkimError;
use crate::teleport::TeleportParams;
use crate::zones::{Coord, ZoneId};

/// Opaque transit stop identifier, assigned by the schedule collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StopId(pub u32);

/// Itinerary breakdown for one reachable stop in an arrival tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopArrival {
    /// Walk from the origin coordinate to the first boarding stop.
    pub access_s: f64,
    /// Wait for the first departure.
    pub wait_s: f64,
    /// Total in-vehicle time, all legs.
    pub in_vehicle_s: f64,
}

impl StopArrival {
    pub fn total_s(&self) -> f64 {
        self.access_s + self.wait_s + self.in_vehicle_s
    }
}

/// Transit-schedule capability consumed from the collaborator layer.
/// Shared read-only across all worker threads of one build.
pub trait TransitSchedule: Send + Sync {
    fn stop_location(&self, stop: StopId) -> Option<Coord>;

    /// All stops within `radius_m` of `center`.
    fn stops_in_radius(&self, center: Coord, radius_m: f64) -> Vec<StopId>;

    /// The single closest stop, `None` if the schedule has no stops.
    fn nearest_stop(&self, center: Coord) -> Option<StopId>;

    /// One-to-many itinerary search: arrival breakdown for every stop
    /// reachable from `origin` when departing at `departure_time_s`.
    fn arrival_tree(&self, origin: Coord, departure_time_s: f64) -> HashMap<StopId, StopArrival>;
}

/// Zone-side transit parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitParams {
    /// Initial stop-search radius around a zone's representative coordinate.
    pub search_radius_m: f64,
    /// Added to the distance-to-nearest-stop when the initial search is empty.
    pub extension_radius_m: f64,
    pub walk_speed_mps: f64,
    /// Detour factor applied to beeline walk distances.
    pub beeline_factor: f64,
}

impl Default for TransitParams {
    fn default() -> Self {
        Self {
            search_radius_m: 1000.0,
            extension_radius_m: 200.0,
            walk_speed_mps: 1.34,
            beeline_factor: 1.3,
        }
    }
}

impl TransitParams {
    /// Walk time between two coordinates: beeline × factor ÷ speed.
    pub fn walk_time_s(&self, a: Coord, b: Coord) -> f64 {
        a.distance_to(b) * self.beeline_factor / self.walk_speed_mps
    }
}

/// What the transit mode degenerates to when no schedule is supplied at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransitFallback {
    /// Transit matrix = free-speed car matrix × factor, cell for cell.
    FreeSpeedFactor(f64),
    /// Full beeline teleportation.
    Teleport(TeleportParams),
}

/// Per-zone candidate transit stops, computed once before the parallel phase
/// and read-only afterwards. Construction is the barrier: workers only start
/// after `build` has returned.
pub struct NearbyStopIndex {
    stops_per_zone: Vec<Vec<StopId>>,
}

impl NearbyStopIndex {
    /// Sequential pre-step. For every zone: search within the configured
    /// radius; if empty, locate the nearest stop and re-search with
    /// (distance-to-nearest + extension) so at least one stop is guaranteed.
    /// A schedule with no stops at all is fatal for the transit build.
    pub fn build(
        representatives: &[(ZoneId, Coord)],
        schedule: &dyn TransitSchedule,
        params: &TransitParams,
    ) -> Result<Self, SkimError> {
        let mut stops_per_zone = Vec::with_capacity(representatives.len());
        let mut escalated = 0usize;

        for &(zone_id, coord) in representatives {
            let mut stops = schedule.stops_in_radius(coord, params.search_radius_m);
            if stops.is_empty() {
                let nearest = schedule
                    .nearest_stop(coord)
                    .ok_or(SkimError::NoTransitStops(zone_id))?;
                let nearest_coord = schedule
                    .stop_location(nearest)
                    .ok_or(SkimError::NoTransitStops(zone_id))?;
                let extended = coord.distance_to(nearest_coord) + params.extension_radius_m;
                stops = schedule.stops_in_radius(coord, extended);
                if stops.is_empty() {
                    // The extended radius covers the nearest stop; only float
                    // edge cases land here.
                    stops.push(nearest);
                }
                escalated += 1;
            }
            stops_per_zone.push(stops);
        }

        if escalated > 0 {
            debug!("nearby-stop search escalated radius for {escalated} zone(s)");
        }
        Ok(Self { stops_per_zone })
    }

    pub fn stops_for(&self, zone_index: usize) -> &[StopId] {
        &self.stops_per_zone[zone_index]
    }

    pub fn len(&self) -> usize {
        self.stops_per_zone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops_per_zone.is_empty()
    }
}

/// Per-origin transit row computation. One instance per partition task; the
/// schedule reference is shared read-only.
pub struct TransitRowEngine<'a> {
    schedule: &'a dyn TransitSchedule,
    params: &'a TransitParams,
}

impl<'a> TransitRowEngine<'a> {
    pub fn new(schedule: &'a dyn TransitSchedule, params: &'a TransitParams) -> Self {
        Self { schedule, params }
    }

    /// Fill one origin row. For each destination, the minimum over that
    /// zone's candidate stops of access + wait + in-vehicle + egress walk,
    /// compared against the direct beeline walk. The self-zone cell is left
    /// unset for the imputer.
    pub fn compute_row(
        &self,
        origin_index: usize,
        origin: Coord,
        departure_time_s: f64,
        destinations: &[Coord],
        stop_index: &NearbyStopIndex,
        row: &mut [f32],
    ) {
        let tree = self.schedule.arrival_tree(origin, departure_time_s);

        for (j, &destination) in destinations.iter().enumerate() {
            if j == origin_index {
                continue;
            }
            let mut best_s = self.params.walk_time_s(origin, destination);
            for &stop in stop_index.stops_for(j) {
                let Some(arrival) = tree.get(&stop) else {
                    continue;
                };
                let Some(stop_coord) = self.schedule.stop_location(stop) else {
                    continue;
                };
                let egress_s = self.params.walk_time_s(stop_coord, destination);
                let total_s = arrival.total_s() + egress_s;
                if total_s < best_s {
                    best_s = total_s;
                }
            }
            row[j] = (best_s / 60.0) as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::SkimMatrix;
    use crate::test_helpers::FixedTransitSchedule;

    fn reps(coords: &[(f64, f64)]) -> Vec<(ZoneId, Coord)> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| (ZoneId(i as u32 + 1), Coord::new(x, y)))
            .collect()
    }

    #[test]
    fn stop_index_uses_radius_then_escalates() {
        let schedule = FixedTransitSchedule::new(vec![
            (StopId(1), Coord::new(0.0, 0.0)),
            (StopId(2), Coord::new(5000.0, 0.0)),
        ]);
        let params = TransitParams {
            search_radius_m: 500.0,
            extension_radius_m: 100.0,
            ..TransitParams::default()
        };
        // Zone 1 sits on stop 1; zone 2 is 2 km from the nearest stop.
        let representatives = reps(&[(100.0, 0.0), (7000.0, 0.0)]);
        let index =
            NearbyStopIndex::build(&representatives, &schedule, &params).expect("stop index");

        assert_eq!(index.stops_for(0), &[StopId(1)]);
        // Escalated search still finds exactly the nearest stop.
        assert_eq!(index.stops_for(1), &[StopId(2)]);
    }

    #[test]
    fn empty_schedule_is_fatal_for_transit_only() {
        let schedule = FixedTransitSchedule::new(vec![]);
        let representatives = reps(&[(0.0, 0.0)]);
        let result =
            NearbyStopIndex::build(&representatives, &schedule, &TransitParams::default());
        assert!(matches!(result, Err(SkimError::NoTransitStops(ZoneId(1)))));
    }

    #[test]
    fn row_takes_minimum_over_stops_and_beeline_walk() {
        // Stop 1 near the origin, stop 2 near the destination.
        let mut schedule = FixedTransitSchedule::new(vec![
            (StopId(1), Coord::new(0.0, 0.0)),
            (StopId(2), Coord::new(10_000.0, 0.0)),
        ]);
        schedule.set_arrival(
            StopId(2),
            StopArrival {
                access_s: 60.0,
                wait_s: 120.0,
                in_vehicle_s: 600.0,
            },
        );

        let params = TransitParams {
            walk_speed_mps: 1.0,
            beeline_factor: 1.0,
            ..TransitParams::default()
        };
        let destinations = vec![Coord::new(0.0, 0.0), Coord::new(10_100.0, 0.0)];
        let representatives = reps(&[(0.0, 0.0), (10_100.0, 0.0)]);
        let index =
            NearbyStopIndex::build(&representatives, &schedule, &params).expect("stop index");

        let engine = TransitRowEngine::new(&schedule, &params);
        let mut row = vec![SkimMatrix::UNSET; 2];
        engine.compute_row(0, destinations[0], 8.0 * 3600.0, &destinations, &index, &mut row);

        // access 60 + wait 120 + in-vehicle 600 + egress 100 m walk = 880 s,
        // far below the 10 100 s direct walk.
        assert!((row[1] - 880.0 / 60.0).abs() < 1e-4);
        // Self-zone cell stays unset for the imputer.
        assert!(SkimMatrix::is_unset(row[0]));
    }

    #[test]
    fn beeline_walk_wins_for_adjacent_zones() {
        let mut schedule = FixedTransitSchedule::new(vec![(StopId(1), Coord::new(0.0, 0.0))]);
        schedule.set_arrival(
            StopId(1),
            StopArrival {
                access_s: 300.0,
                wait_s: 600.0,
                in_vehicle_s: 0.0,
            },
        );
        let params = TransitParams {
            walk_speed_mps: 1.0,
            beeline_factor: 1.0,
            ..TransitParams::default()
        };
        let destinations = vec![Coord::new(0.0, 0.0), Coord::new(100.0, 0.0)];
        let representatives = reps(&[(0.0, 0.0), (100.0, 0.0)]);
        let index =
            NearbyStopIndex::build(&representatives, &schedule, &params).expect("stop index");

        let engine = TransitRowEngine::new(&schedule, &params);
        let mut row = vec![SkimMatrix::UNSET; 2];
        engine.compute_row(0, destinations[0], 8.0 * 3600.0, &destinations, &index, &mut row);

        // 100 m direct walk beats any transit itinerary.
        assert!((row[1] - 100.0 / 60.0).abs() < 1e-4);
    }
}
