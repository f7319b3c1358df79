//! Routable network collaborator: nodes, directed links, nearest-node lookup,
//! and the per-link cost seam used by the skim searches.
//!
//! Two cost models ship with the crate:
//!
//! - **`FreeSpeedCost`**: link length ÷ free-flow speed. Used for bootstrap
//!   skims when no calibrated travel times are available yet.
//! - **`HourlyProfileCost`**: free-flow time divided by a per-hour speed
//!   factor, for congested time-of-day skims.
//!
//! Anything richer (per-traveler disutility, dynamic assignment output) plugs
//! in through the [`LinkCost`] trait.

use kdtree::distance::squared_euclidean;
use kdtree::KdTree;
use serde::{Deserialize, Serialize};

use crate::zones::Coord;

/// Dense network node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub coord: Coord,
}

/// A directed link. Costs are derived from length and free-flow speed by the
/// active [`LinkCost`] model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub from: NodeId,
    pub to: NodeId,
    pub length_m: f64,
    pub freespeed_mps: f64,
}

/// Immutable routable network with an index for nearest-node queries.
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    outgoing: Vec<Vec<usize>>,
    node_tree: KdTree<f64, usize, [f64; 2]>,
}

impl Network {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn link(&self, index: usize) -> &Link {
        &self.links[index]
    }

    /// Indices of links leaving `node`.
    pub fn outgoing_links(&self, node: NodeId) -> &[usize] {
        &self.outgoing[node.0]
    }

    /// Nearest node to a coordinate, `None` on an empty network.
    pub fn nearest_node(&self, coord: Coord) -> Option<NodeId> {
        let found = self
            .node_tree
            .nearest(&[coord.x, coord.y], 1, &squared_euclidean)
            .ok()?;
        found.first().map(|&(_, &index)| NodeId(index))
    }
}

/// Incremental network construction; `build` freezes the node set and
/// creates the spatial index.
#[derive(Default)]
pub struct NetworkBuilder {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, coord: Coord) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { id, coord });
        id
    }

    pub fn add_link(&mut self, from: NodeId, to: NodeId, length_m: f64, freespeed_mps: f64) {
        debug_assert!(length_m >= 0.0, "link length must be non-negative");
        debug_assert!(freespeed_mps > 0.0, "free speed must be positive");
        self.links.push(Link {
            from,
            to,
            length_m,
            freespeed_mps,
        });
    }

    /// Two directed links, one per direction.
    pub fn add_bidirectional(&mut self, a: NodeId, b: NodeId, length_m: f64, freespeed_mps: f64) {
        self.add_link(a, b, length_m, freespeed_mps);
        self.add_link(b, a, length_m, freespeed_mps);
    }

    pub fn build(self) -> Network {
        let mut outgoing = vec![Vec::new(); self.nodes.len()];
        for (index, link) in self.links.iter().enumerate() {
            outgoing[link.from.0].push(index);
        }
        let mut node_tree = KdTree::new(2);
        for node in &self.nodes {
            node_tree
                .add([node.coord.x, node.coord.y], node.id.0)
                .expect("finite node coordinates");
        }
        Network {
            nodes: self.nodes,
            links: self.links,
            outgoing,
            node_tree,
        }
    }
}

/// Per-link travel-time model, parameterized by link entry time
/// (seconds of day). Implementations must be `Send + Sync`; one instance is
/// shared read-only across all worker threads of a build.
pub trait LinkCost: Send + Sync {
    fn link_travel_time(&self, link: &Link, enter_time_s: f64) -> f64;
}

/// Uncongested traversal time: length ÷ free-flow speed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeSpeedCost;

impl LinkCost for FreeSpeedCost {
    fn link_travel_time(&self, link: &Link, _enter_time_s: f64) -> f64 {
        link.length_m / link.freespeed_mps
    }
}

/// Time-of-day congestion: per-hour speed factors applied to free-flow speed.
/// Factor 1.0 = free flow; 0.4 = heavy congestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourlyProfileCost {
    pub hourly_factors: [f64; 24],
}

impl HourlyProfileCost {
    /// Same factor for every hour of the day.
    pub fn uniform(factor: f64) -> Self {
        Self {
            hourly_factors: [factor; 24],
        }
    }

    pub fn from_factors(hourly_factors: [f64; 24]) -> Self {
        Self { hourly_factors }
    }

    fn factor_at(&self, time_s: f64) -> f64 {
        let hour = ((time_s / 3600.0) as usize) % 24;
        self.hourly_factors[hour]
    }
}

impl LinkCost for HourlyProfileCost {
    fn link_travel_time(&self, link: &Link, enter_time_s: f64) -> f64 {
        let factor = self.factor_at(enter_time_s).max(1e-3);
        link.length_m / (link.freespeed_mps * factor)
    }
}

/// Immutable per-mode cost model bound to a departure time. Copied freely
/// into worker tasks; everything behind it is read-only for the build.
#[derive(Clone, Copy)]
pub struct RoutingContext<'a> {
    pub network: &'a Network,
    pub cost: &'a dyn LinkCost,
    pub departure_time_s: f64,
}

impl<'a> RoutingContext<'a> {
    pub fn new(network: &'a Network, cost: &'a dyn LinkCost, departure_time_s: f64) -> Self {
        Self {
            network,
            cost,
            departure_time_s,
        }
    }
}
