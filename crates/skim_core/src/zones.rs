//! Zone system: planar coordinates, polygon geometry, and the id→index map
//! that both axes of a skim matrix are built on.
//!
//! Zone ids are stable opaque integers and need not be contiguous; all dense
//! storage goes through [`ZoneSystem`] index lookups. Zones are immutable for
//! the duration of a skim build.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, opaque zone identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(pub u32);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Planar coordinate in metres (projected CRS assumed).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean (beeline) distance in metres.
    pub fn distance_to(&self, other: Coord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Simple polygon given by its exterior ring. The ring may be open or closed;
/// the closing edge is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    exterior: Vec<Coord>,
}

impl Polygon {
    pub fn new(exterior: Vec<Coord>) -> Self {
        Self { exterior }
    }

    /// Axis-aligned rectangle, a common zone shape in synthetic scenarios.
    pub fn rectangle(min: Coord, max: Coord) -> Self {
        Self::new(vec![
            min,
            Coord::new(max.x, min.y),
            max,
            Coord::new(min.x, max.y),
        ])
    }

    pub fn exterior(&self) -> &[Coord] {
        &self.exterior
    }

    /// Shoelace signed area; positive for counter-clockwise rings.
    pub fn signed_area(&self) -> f64 {
        let n = self.exterior.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            let a = self.exterior[i];
            let b = self.exterior[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum * 0.5
    }

    /// A polygon with fewer than three vertices or (near-)zero area cannot
    /// anchor a zone onto the network.
    pub fn is_degenerate(&self) -> bool {
        self.exterior.len() < 3 || self.signed_area().abs() < 1e-9
    }

    /// Area-weighted centroid. `None` for degenerate geometry.
    pub fn centroid(&self) -> Option<Coord> {
        if self.is_degenerate() {
            return None;
        }
        let n = self.exterior.len();
        let area = self.signed_area();
        let mut cx = 0.0;
        let mut cy = 0.0;
        for i in 0..n {
            let a = self.exterior[i];
            let b = self.exterior[(i + 1) % n];
            let cross = a.x * b.y - b.x * a.y;
            cx += (a.x + b.x) * cross;
            cy += (a.y + b.y) * cross;
        }
        Some(Coord::new(cx / (6.0 * area), cy / (6.0 * area)))
    }

    /// Even-odd ray cast. Points exactly on an edge may land on either side;
    /// callers sampling interior points should not rely on boundary behavior.
    pub fn contains(&self, point: Coord) -> bool {
        let n = self.exterior.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.exterior[i];
            let b = self.exterior[j];
            if (a.y > point.y) != (b.y > point.y) {
                let x_cross = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
                if point.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// `(min, max)` corners of the bounding box. `None` for an empty ring.
    pub fn bounding_box(&self) -> Option<(Coord, Coord)> {
        let first = *self.exterior.first()?;
        let mut min = first;
        let mut max = first;
        for c in &self.exterior[1..] {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        Some((min, max))
    }
}

/// A geographic zone: id, polygon, and an optional demographic aggregate
/// used for population weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub geometry: Polygon,
    pub population: Option<u32>,
}

impl Zone {
    pub fn new(id: ZoneId, geometry: Polygon) -> Self {
        Self {
            id,
            geometry,
            population: None,
        }
    }

    pub fn with_population(mut self, population: u32) -> Self {
        self.population = Some(population);
        self
    }
}

/// A residential location contributing to population-weighted connectors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Residence {
    pub zone: ZoneId,
    pub location: Coord,
    pub occupants: u32,
}

/// The full zone set plus the id→index map used by every dense structure.
///
/// Index order is the input order of the zones and stays fixed for the
/// lifetime of the system; skim partitioning and matrix axes both rely on it.
#[derive(Debug, Clone)]
pub struct ZoneSystem {
    zones: Vec<Zone>,
    index_of: HashMap<ZoneId, usize>,
}

impl ZoneSystem {
    /// Build from a zone list. Panics on duplicate ids, which is a caller
    /// configuration bug rather than a runtime condition.
    pub fn new(zones: Vec<Zone>) -> Self {
        let mut index_of = HashMap::with_capacity(zones.len());
        for (i, zone) in zones.iter().enumerate() {
            let previous = index_of.insert(zone.id, i);
            assert!(previous.is_none(), "duplicate zone id {}", zone.id);
        }
        Self { zones, index_of }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn index_of(&self, id: ZoneId) -> Option<usize> {
        self.index_of.get(&id).copied()
    }

    pub fn id_at(&self, index: usize) -> ZoneId {
        self.zones[index].id
    }

    pub fn ids(&self) -> Vec<ZoneId> {
        self.zones.iter().map(|z| z.id).collect()
    }

    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.index_of(id).map(|i| &self.zones[i])
    }
}
