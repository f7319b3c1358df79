//! Zone connectors: each zone's "door" onto the network.
//!
//! Runs once per network/zone state and produces, for every zone, an ordered
//! non-empty list of representative coordinates. Three strategies, selectable
//! via [`ConnectorStrategy`]:
//!
//! - **`Random`**: N interior points per zone by rejection sampling.
//!   Deterministic only when a seed is supplied.
//! - **`WeightedByPopulation`**: weighted centroid over residences, weight
//!   per residence = `1 + occupants`.
//! - **`GeometricCentroid`**: polygon centroid, deterministic.

use std::collections::HashMap;

use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SkimError;
use crate::zones::{Coord, Polygon, Residence, ZoneId, ZoneSystem};

/// Rejection-sampling budget per interior point. Polygons that pass the
/// degeneracy check but are extremely thin can exhaust this; they fall back
/// to the centroid.
const MAX_SAMPLE_ATTEMPTS: usize = 2000;

/// Connector selection strategy. Serializes into run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectorStrategy {
    /// N random interior points per zone.
    Random {
        points_per_zone: usize,
        /// Seed for reproducibility; `None` draws from entropy.
        seed: Option<u64>,
    },
    /// One point per zone: the residence-weighted centroid.
    WeightedByPopulation,
    /// One point per zone: the polygon centroid.
    GeometricCentroid,
}

impl Default for ConnectorStrategy {
    fn default() -> Self {
        ConnectorStrategy::GeometricCentroid
    }
}

/// Zone index → ordered, non-empty coordinate list, aligned with the
/// [`ZoneSystem`] index order. Read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneConnectors {
    coords_per_zone: Vec<Vec<Coord>>,
}

impl ZoneConnectors {
    pub fn len(&self) -> usize {
        self.coords_per_zone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords_per_zone.is_empty()
    }

    pub fn coords(&self, zone_index: usize) -> &[Coord] {
        &self.coords_per_zone[zone_index]
    }

    /// The zone's primary access coordinate (first in the list).
    pub fn representative(&self, zone_index: usize) -> Coord {
        self.coords_per_zone[zone_index][0]
    }
}

/// Builds the connector table for a zone system.
pub struct ZoneConnectorManager<'a> {
    zones: &'a ZoneSystem,
    residences: &'a [Residence],
}

impl<'a> ZoneConnectorManager<'a> {
    pub fn new(zones: &'a ZoneSystem, residences: &'a [Residence]) -> Self {
        Self { zones, residences }
    }

    /// Compute one connector list per zone. A zone with degenerate geometry
    /// is a fatal configuration error.
    pub fn build(&self, strategy: &ConnectorStrategy) -> Result<ZoneConnectors, SkimError> {
        match strategy {
            ConnectorStrategy::Random {
                points_per_zone,
                seed,
            } => self.build_random((*points_per_zone).max(1), *seed),
            ConnectorStrategy::WeightedByPopulation => self.build_weighted(),
            ConnectorStrategy::GeometricCentroid => self.build_centroids(),
        }
    }

    fn build_centroids(&self) -> Result<ZoneConnectors, SkimError> {
        let mut coords_per_zone = Vec::with_capacity(self.zones.len());
        for zone in self.zones.zones() {
            let centroid = zone
                .geometry
                .centroid()
                .ok_or(SkimError::DegenerateZone(zone.id))?;
            coords_per_zone.push(vec![centroid]);
        }
        Ok(ZoneConnectors { coords_per_zone })
    }

    fn build_random(
        &self,
        points_per_zone: usize,
        seed: Option<u64>,
    ) -> Result<ZoneConnectors, SkimError> {
        let mut rng: StdRng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut coords_per_zone = Vec::with_capacity(self.zones.len());
        for zone in self.zones.zones() {
            let centroid = zone
                .geometry
                .centroid()
                .ok_or(SkimError::DegenerateZone(zone.id))?;
            let mut points = Vec::with_capacity(points_per_zone);
            for _ in 0..points_per_zone {
                points.push(random_interior_point(&zone.geometry, &mut rng).unwrap_or_else(|| {
                    debug!("zone {}: interior sampling exhausted, using centroid", zone.id);
                    centroid
                }));
            }
            coords_per_zone.push(points);
        }
        Ok(ZoneConnectors { coords_per_zone })
    }

    fn build_weighted(&self) -> Result<ZoneConnectors, SkimError> {
        // Group residences by zone: (weight sum, weighted x, weighted y).
        let mut by_zone: HashMap<ZoneId, (f64, f64, f64)> = HashMap::new();
        for residence in self.residences {
            let weight = 1.0 + residence.occupants as f64;
            let entry = by_zone.entry(residence.zone).or_insert((0.0, 0.0, 0.0));
            entry.0 += weight;
            entry.1 += weight * residence.location.x;
            entry.2 += weight * residence.location.y;
        }

        let mut coords_per_zone = Vec::with_capacity(self.zones.len());
        for zone in self.zones.zones() {
            let centroid = zone
                .geometry
                .centroid()
                .ok_or(SkimError::DegenerateZone(zone.id))?;
            let coord = match by_zone.get(&zone.id) {
                Some((weight, wx, wy)) if *weight > 0.0 => Coord::new(wx / weight, wy / weight),
                _ => {
                    warn!(
                        "zone {} has no residences, falling back to geometric centroid",
                        zone.id
                    );
                    centroid
                }
            };
            coords_per_zone.push(vec![coord]);
        }
        Ok(ZoneConnectors { coords_per_zone })
    }
}

/// Uniform interior point by rejection sampling over the bounding box.
fn random_interior_point<R: Rng>(polygon: &Polygon, rng: &mut R) -> Option<Coord> {
    let (min, max) = polygon.bounding_box()?;
    for _ in 0..MAX_SAMPLE_ATTEMPTS {
        let candidate = Coord::new(
            rng.gen_range(min.x..=max.x),
            rng.gen_range(min.y..=max.y),
        );
        if polygon.contains(candidate) {
            return Some(candidate);
        }
    }
    None
}
