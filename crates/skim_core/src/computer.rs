//! Parallel skim construction: partitions origins across a fixed worker
//! pool and fans out to the per-mode engines.
//!
//! Scheduling model: static contiguous partitions of `ceil(n / threads)`
//! origins in zone-system order, no work stealing. Each partition task
//! constructs its own search engine and scratch (factory-per-task; nothing
//! search-stateful is shared between tasks) and writes its origin rows into
//! disjoint slices of the pre-sized matrix, so no locking is needed. Any
//! task failure aborts the whole build; no partial matrix is returned.
//!
//! The final matrix content is identical regardless of worker count or
//! scheduling order, and bit-identical across runs given a deterministic
//! cost model and connector strategy.

use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::connectors::ZoneConnectors;
use crate::error::SkimError;
use crate::imputation::{IntrazonalFillParameters, IntrazonalImputer};
use crate::matrix::SkimMatrix;
use crate::network::{NodeId, RoutingContext};
use crate::search::{AggregateSink, AggregatedTargetSearch};
use crate::teleport::{PointToPointRouter, TeleportParams, TeleportationEstimator};
use crate::transit::{
    NearbyStopIndex, TransitFallback, TransitParams, TransitRowEngine, TransitSchedule,
};
use crate::zones::{Coord, ZoneId, ZoneSystem};

/// Build configuration. All values are explicit parameters of the build;
/// there is no ambient/global configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkimConfig {
    /// Worker pool size.
    pub threads: usize,
    /// Departure time in seconds of day.
    pub departure_time_s: f64,
    pub intrazonal: IntrazonalFillParameters,
}

impl Default for SkimConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            departure_time_s: 8.0 * 3600.0,
            intrazonal: IntrazonalFillParameters::default(),
        }
    }
}

impl SkimConfig {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_departure_time(mut self, departure_time_s: f64) -> Self {
        self.departure_time_s = departure_time_s;
        self
    }

    pub fn with_intrazonal(mut self, intrazonal: IntrazonalFillParameters) -> Self {
        self.intrazonal = intrazonal;
        self
    }
}

/// Per-mode collaborator bundle for one matrix build.
pub enum ModeSpec<'a> {
    /// Car or free-speed skim over the routable network; the cost model
    /// decides which (congested vs. free-flow).
    Network { context: RoutingContext<'a> },
    /// Transit itinerary search over a schedule collaborator.
    Transit {
        schedule: &'a dyn TransitSchedule,
        params: TransitParams,
    },
    /// Beeline estimation for modes without a network representation.
    Teleported {
        params: TeleportParams,
        router: Option<&'a dyn PointToPointRouter>,
    },
}

/// Builds one skim matrix per call from a zone system and its connector
/// table. Zones, connectors, and all mode collaborators are read-only for
/// the duration of a build.
pub struct ParallelSkimComputer<'a> {
    zones: &'a ZoneSystem,
    connectors: &'a ZoneConnectors,
    config: SkimConfig,
}

impl<'a> ParallelSkimComputer<'a> {
    pub fn new(
        zones: &'a ZoneSystem,
        connectors: &'a ZoneConnectors,
        config: SkimConfig,
    ) -> Result<Self, SkimError> {
        if connectors.len() != zones.len() {
            return Err(SkimError::ZoneCountMismatch {
                connectors: connectors.len(),
                zones: zones.len(),
            });
        }
        Ok(Self {
            zones,
            connectors,
            config,
        })
    }

    pub fn config(&self) -> &SkimConfig {
        &self.config
    }

    /// Build the matrix for one mode.
    pub fn compute(&self, mode: &ModeSpec<'_>) -> Result<SkimMatrix, SkimError> {
        match mode {
            ModeSpec::Network { context } => self.compute_network(*context),
            ModeSpec::Transit { schedule, params } => self.compute_transit(*schedule, params),
            ModeSpec::Teleported { params, router } => self.compute_teleported(*params, *router),
        }
    }

    /// Car / free-speed skim via the aggregated multi-target search.
    pub fn compute_network(&self, context: RoutingContext<'_>) -> Result<SkimMatrix, SkimError> {
        let n = self.zones.len();
        let network = context.network;

        // Snap every zone onto the network once, up front. An unresolvable
        // access coordinate is a fatal configuration error.
        let mut origin_nodes = Vec::with_capacity(n);
        let mut destination_nodes: Vec<Vec<NodeId>> = Vec::with_capacity(n);
        for index in 0..n {
            let zone_id = self.zones.id_at(index);
            let origin = network
                .nearest_node(self.connectors.representative(index))
                .ok_or(SkimError::NoNetworkNode(zone_id))?;
            origin_nodes.push(origin);

            let mut nodes = Vec::with_capacity(self.connectors.coords(index).len());
            for &coord in self.connectors.coords(index) {
                nodes.push(
                    network
                        .nearest_node(coord)
                        .ok_or(SkimError::NoNetworkNode(zone_id))?,
                );
            }
            nodes.sort_unstable();
            nodes.dedup();
            destination_nodes.push(nodes);
        }
        let sink = AggregateSink::new(network, destination_nodes.iter().flatten().copied());

        let mut matrix = SkimMatrix::new(self.zones.ids());
        self.run_partitions(&mut matrix, |first_origin, rows| {
            let mut search = AggregatedTargetSearch::new(context);
            for (offset, row) in rows.chunks_mut(n).enumerate() {
                let i = first_origin + offset;
                search.run(origin_nodes[i], &sink);
                for (j, cell) in row.iter_mut().enumerate() {
                    if i == j {
                        continue; // intrazonal cell belongs to the imputer
                    }
                    let mut best_s = f64::INFINITY;
                    for &node in &destination_nodes[j] {
                        if let Some(cost_s) = search.cost_to(node) {
                            best_s = best_s.min(cost_s);
                        }
                    }
                    if best_s.is_finite() {
                        *cell = (best_s / 60.0) as f32;
                    }
                }
            }
            Ok(())
        })?;
        self.finish(matrix)
    }

    /// Transit skim: sequential nearby-stop pre-step, then one arrival tree
    /// per origin in parallel.
    pub fn compute_transit(
        &self,
        schedule: &dyn TransitSchedule,
        params: &TransitParams,
    ) -> Result<SkimMatrix, SkimError> {
        let n = self.zones.len();
        let representatives: Vec<(ZoneId, Coord)> = (0..n)
            .map(|i| (self.zones.id_at(i), self.connectors.representative(i)))
            .collect();

        // The pre-step completes before the pool is entered; every worker
        // observes the finished index.
        let stop_index = NearbyStopIndex::build(&representatives, schedule, params)?;
        let coords: Vec<Coord> = representatives.iter().map(|&(_, c)| c).collect();
        let departure = self.config.departure_time_s;

        let mut matrix = SkimMatrix::new(self.zones.ids());
        self.run_partitions(&mut matrix, |first_origin, rows| {
            let engine = TransitRowEngine::new(schedule, params);
            for (offset, row) in rows.chunks_mut(n).enumerate() {
                let i = first_origin + offset;
                engine.compute_row(i, coords[i], departure, &coords, &stop_index, row);
            }
            Ok(())
        })?;
        self.finish(matrix)
    }

    /// Transit entry point covering the degenerate no-schedule case: fall
    /// back to scaling the free-speed car skim or to full teleportation,
    /// per configuration.
    pub fn compute_transit_with_fallback(
        &self,
        schedule: Option<&dyn TransitSchedule>,
        params: &TransitParams,
        fallback: &TransitFallback,
        free_speed: Option<RoutingContext<'_>>,
    ) -> Result<SkimMatrix, SkimError> {
        match schedule {
            Some(schedule) => self.compute_transit(schedule, params),
            None => match fallback {
                TransitFallback::FreeSpeedFactor(factor) => {
                    let context = free_speed.ok_or(SkimError::MissingFallbackContext)?;
                    let mut matrix = self.compute_network(context)?;
                    matrix.scale(*factor as f32);
                    Ok(matrix)
                }
                TransitFallback::Teleport(teleport) => self.compute_teleported(*teleport, None),
            },
        }
    }

    /// Beeline skim for modes without a network representation.
    pub fn compute_teleported(
        &self,
        params: TeleportParams,
        router: Option<&dyn PointToPointRouter>,
    ) -> Result<SkimMatrix, SkimError> {
        let n = self.zones.len();
        let coords: Vec<Coord> = (0..n).map(|i| self.connectors.representative(i)).collect();
        let departure = self.config.departure_time_s;

        let mut matrix = SkimMatrix::new(self.zones.ids());
        self.run_partitions(&mut matrix, |first_origin, rows| {
            let estimator = match router {
                Some(router) => TeleportationEstimator::with_router(params, router),
                None => TeleportationEstimator::new(params),
            };
            for (offset, row) in rows.chunks_mut(n).enumerate() {
                let i = first_origin + offset;
                for (j, cell) in row.iter_mut().enumerate() {
                    if i == j {
                        continue;
                    }
                    let seconds = estimator.travel_time_s(coords[i], coords[j], departure);
                    *cell = (seconds / 60.0) as f32;
                }
            }
            Ok(())
        })?;
        self.finish(matrix)
    }

    /// Run one task per contiguous origin partition over disjoint row chunks
    /// of the pre-sized matrix.
    fn run_partitions<F>(&self, matrix: &mut SkimMatrix, task: F) -> Result<(), SkimError>
    where
        F: Fn(usize, &mut [f32]) -> Result<(), SkimError> + Sync,
    {
        let n = matrix.zone_count();
        if n == 0 {
            return Ok(());
        }
        let threads = self.config.threads.max(1);
        let chunk_rows = n.div_ceil(threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| SkimError::WorkerPool(e.to_string()))?;

        let values = matrix.values_mut();
        pool.install(|| {
            values
                .par_chunks_mut(chunk_rows * n)
                .enumerate()
                .map(|(chunk, rows)| task(chunk * chunk_rows, rows))
                .collect::<Result<(), SkimError>>()
        })
    }

    /// Sequential post-pass: intrazonal / unresolved-cell imputation. The
    /// returned matrix is the finished, immutable artifact.
    fn finish(&self, mut matrix: SkimMatrix) -> Result<SkimMatrix, SkimError> {
        let imputer = IntrazonalImputer::new(self.config.intrazonal);
        let filled = imputer.impute(&mut matrix);
        debug!(
            "skim finished: {} zones, {} off-diagonal cell(s) imputed",
            matrix.zone_count(),
            filled
        );
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{ConnectorStrategy, ZoneConnectorManager};
    use crate::network::{FreeSpeedCost, Network};
    use crate::test_helpers::{chain_network, zone_row, FixedTransitSchedule};
    use crate::transit::{StopArrival, StopId};

    /// Three 1 km² zones in a row, network chain through their centroids,
    /// 1000 m links at 10 m/s: 100 s per hop.
    fn three_zone_setup() -> (ZoneSystem, Network) {
        (zone_row(3, 1000.0), chain_network(3, 1000.0, 10.0))
    }

    fn centroid_connectors(zones: &ZoneSystem) -> crate::connectors::ZoneConnectors {
        ZoneConnectorManager::new(zones, &[])
            .build(&ConnectorStrategy::GeometricCentroid)
            .expect("connectors")
    }

    #[test]
    fn end_to_end_three_zone_car_skim() {
        let (zones, network) = three_zone_setup();
        let connectors = centroid_connectors(&zones);
        let computer =
            ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default()).expect("computer");
        let context = RoutingContext::new(&network, &FreeSpeedCost, 8.0 * 3600.0);
        let matrix = computer.compute_network(context).expect("car skim");

        // One hop = 100 s = 1.667 min, two hops double that, both directions.
        let hop_min = 100.0 / 60.0;
        assert!((matrix.get(ZoneId(1), ZoneId(2)).unwrap() as f64 - hop_min).abs() < 1e-4);
        assert!((matrix.get(ZoneId(2), ZoneId(1)).unwrap() as f64 - hop_min).abs() < 1e-4);
        assert!((matrix.get(ZoneId(1), ZoneId(3)).unwrap() as f64 - 2.0 * hop_min).abs() < 1e-4);

        // Non-negative everywhere, correctly imputed diagonal.
        let ceiling = computer.config().intrazonal.ceiling_minutes;
        for &value in matrix.values() {
            assert!(value >= 0.0);
        }
        for z in 1..=3 {
            let diagonal = matrix.get(ZoneId(z), ZoneId(z)).unwrap() as f64;
            assert!(diagonal > 0.0);
            assert!(diagonal <= ceiling);
        }
    }

    #[test]
    fn thread_count_invariance() {
        let zones = zone_row(7, 1000.0);
        let network = chain_network(7, 1000.0, 10.0);
        let connectors = centroid_connectors(&zones);
        let context = RoutingContext::new(&network, &FreeSpeedCost, 8.0 * 3600.0);

        let single = ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default())
            .expect("computer")
            .compute_network(context)
            .expect("skim");
        let parallel =
            ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default().with_threads(4))
                .expect("computer")
                .compute_network(context)
                .expect("skim");

        assert!(single.bit_identical(&parallel));
    }

    #[test]
    fn seeded_random_connectors_are_deterministic_end_to_end() {
        let zones = zone_row(4, 1000.0);
        let network = chain_network(4, 1000.0, 10.0);
        let strategy = ConnectorStrategy::Random {
            points_per_zone: 2,
            seed: Some(99),
        };
        let context = RoutingContext::new(&network, &FreeSpeedCost, 8.0 * 3600.0);

        let build = || {
            let connectors = ZoneConnectorManager::new(&zones, &[])
                .build(&strategy)
                .expect("connectors");
            ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default().with_threads(2))
                .expect("computer")
                .compute_network(context)
                .expect("skim")
        };

        assert!(build().bit_identical(&build()));
    }

    #[test]
    fn transit_fallback_scales_free_speed_skim_cell_for_cell() {
        let (zones, network) = three_zone_setup();
        let connectors = centroid_connectors(&zones);
        let computer =
            ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default()).expect("computer");
        let context = RoutingContext::new(&network, &FreeSpeedCost, 8.0 * 3600.0);

        let free_speed = computer.compute_network(context).expect("free-speed skim");
        let transit = computer
            .compute_transit_with_fallback(
                None,
                &TransitParams::default(),
                &TransitFallback::FreeSpeedFactor(2.0),
                Some(context),
            )
            .expect("fallback skim");

        for (pt, fs) in transit.values().iter().zip(free_speed.values()) {
            assert_eq!(pt.to_bits(), (fs * 2.0).to_bits());
        }
    }

    #[test]
    fn fallback_without_context_is_an_error() {
        let (zones, _network) = three_zone_setup();
        let connectors = centroid_connectors(&zones);
        let computer =
            ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default()).expect("computer");
        let result = computer.compute_transit_with_fallback(
            None,
            &TransitParams::default(),
            &TransitFallback::FreeSpeedFactor(1.5),
            None,
        );
        assert!(matches!(result, Err(SkimError::MissingFallbackContext)));
    }

    #[test]
    fn teleported_mode_uses_beeline_formula() {
        let zones = zone_row(2, 1000.0);
        let connectors = centroid_connectors(&zones);
        let computer =
            ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default()).expect("computer");
        let params = TeleportParams {
            beeline_factor: 1.3,
            speed_mps: 5.0,
        };
        let matrix = computer
            .compute(&ModeSpec::Teleported {
                params,
                router: None,
            })
            .expect("teleport skim");

        // Centroids 1000 m apart: 1000 * 1.3 / 5 = 260 s.
        let expected_min = 260.0 / 60.0;
        assert!((matrix.get(ZoneId(1), ZoneId(2)).unwrap() as f64 - expected_min).abs() < 1e-4);
        assert!(matrix.get(ZoneId(1), ZoneId(1)).unwrap() > 0.0);
    }

    #[test]
    fn transit_mode_end_to_end_with_stub_schedule() {
        let zones = zone_row(2, 1000.0);
        let connectors = centroid_connectors(&zones);
        let computer =
            ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default()).expect("computer");

        // One stop at each centroid; riding to the far stop takes 5 minutes.
        let mut schedule = FixedTransitSchedule::new(vec![
            (StopId(1), Coord::new(500.0, 500.0)),
            (StopId(2), Coord::new(1500.0, 500.0)),
        ]);
        schedule.set_arrival(
            StopId(1),
            StopArrival {
                access_s: 0.0,
                wait_s: 60.0,
                in_vehicle_s: 0.0,
            },
        );
        schedule.set_arrival(
            StopId(2),
            StopArrival {
                access_s: 0.0,
                wait_s: 60.0,
                in_vehicle_s: 240.0,
            },
        );

        let params = TransitParams {
            walk_speed_mps: 1.0,
            beeline_factor: 1.0,
            ..TransitParams::default()
        };
        let matrix = computer.compute_transit(&schedule, &params).expect("pt skim");

        // Stop 2 sits on the destination centroid: 60 wait + 240 ride = 300 s,
        // versus a 1000 s direct walk.
        assert!((matrix.get(ZoneId(1), ZoneId(2)).unwrap() as f64 - 5.0).abs() < 1e-4);
    }

    #[test]
    fn connector_zone_mismatch_is_rejected() {
        let zones = zone_row(3, 1000.0);
        let two_zones = zone_row(2, 1000.0);
        let connectors = centroid_connectors(&two_zones);
        let result = ParallelSkimComputer::new(&zones, &connectors, SkimConfig::default());
        assert!(matches!(
            result,
            Err(SkimError::ZoneCountMismatch {
                connectors: 2,
                zones: 3
            })
        ));
    }
}
