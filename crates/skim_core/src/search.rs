//! Multi-target shortest-path search for car / free-speed skims.
//!
//! Instead of O(zones²) point-to-point queries, all destination access nodes
//! are collected into one [`AggregateSink`]; a single Dijkstra per origin
//! then runs until every sink member is settled and each destination's exact
//! travel time is read from that member's own label.
//!
//! The sink is an ephemeral synthetic aggregate scoped to one matrix build;
//! it owns its member list and is never merged into the base network.
//! [`SearchScratch`] is private per-worker state: one instance per partition
//! task, never shared across threads.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::network::{Network, NodeId, RoutingContext};

/// Deduplicated set of destination access nodes acting as one synthetic
/// multi-target sink. The zero-cost membership edges are implicit: a member
/// node being settled settles its share of the sink.
pub struct AggregateSink {
    members: Vec<NodeId>,
    is_member: Vec<bool>,
}

impl AggregateSink {
    pub fn new(network: &Network, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mut is_member = vec![false; network.node_count()];
        let mut members = Vec::new();
        for node in nodes {
            if !is_member[node.0] {
                is_member[node.0] = true;
                members.push(node);
            }
        }
        Self { members, is_member }
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.is_member[node.0]
    }
}

/// Min-heap entry ordered by cost. Ties break on node index so the pop order
/// is fully deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    cost_s: f64,
    node: usize,
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we need the cheapest first.
        other
            .cost_s
            .total_cmp(&self.cost_s)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Mutable per-worker search state: distance labels, frontier, settled set.
/// Reset between origins by walking the touched list instead of refilling
/// the full label array.
pub struct SearchScratch {
    labels: Vec<f64>,
    settled: Vec<bool>,
    touched: Vec<usize>,
    heap: BinaryHeap<QueueEntry>,
}

impl SearchScratch {
    pub fn new(node_count: usize) -> Self {
        Self {
            labels: vec![f64::INFINITY; node_count],
            settled: vec![false; node_count],
            touched: Vec::new(),
            heap: BinaryHeap::new(),
        }
    }

    fn reset(&mut self) {
        for &node in &self.touched {
            self.labels[node] = f64::INFINITY;
            self.settled[node] = false;
        }
        self.touched.clear();
        self.heap.clear();
    }

    fn relax(&mut self, node: usize, cost_s: f64) {
        if cost_s < self.labels[node] {
            if self.labels[node].is_infinite() {
                self.touched.push(node);
            }
            self.labels[node] = cost_s;
            self.heap.push(QueueEntry { cost_s, node });
        }
    }
}

/// One search engine per partition task. Holds the shared read-only routing
/// context plus exclusively-owned scratch state.
pub struct AggregatedTargetSearch<'a> {
    context: RoutingContext<'a>,
    scratch: SearchScratch,
}

impl<'a> AggregatedTargetSearch<'a> {
    pub fn new(context: RoutingContext<'a>) -> Self {
        let scratch = SearchScratch::new(context.network.node_count());
        Self { context, scratch }
    }

    /// Run one origin search, terminating once the aggregate sink is settled,
    /// i.e. once every member node carries a final label (or the frontier is
    /// exhausted for unreachable members). Labels stay valid until the next
    /// `run` call.
    pub fn run(&mut self, origin: NodeId, sink: &AggregateSink) {
        self.scratch.reset();
        let network = self.context.network;
        let departure = self.context.departure_time_s;

        let mut remaining = sink.members().len();
        self.scratch.relax(origin.0, 0.0);

        while let Some(QueueEntry { cost_s, node }) = self.scratch.heap.pop() {
            if self.scratch.settled[node] {
                continue;
            }
            self.scratch.settled[node] = true;

            if sink.contains(NodeId(node)) {
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }

            for &link_index in network.outgoing_links(NodeId(node)) {
                let link = network.link(link_index);
                let enter_time = departure + cost_s;
                let travel = self.context.cost.link_travel_time(link, enter_time);
                self.scratch.relax(link.to.0, cost_s + travel);
            }
        }
    }

    /// Exact point-to-point cost in seconds to `node` from the last origin,
    /// `None` if unreachable. Reads the node's own label, never the sink's
    /// aggregate cost.
    pub fn cost_to(&self, node: NodeId) -> Option<f64> {
        let cost = self.scratch.labels[node.0];
        cost.is_finite().then_some(cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{FreeSpeedCost, LinkCost, NetworkBuilder};
    use crate::zones::Coord;

    /// Chain of `n` nodes spaced 1000 m apart at 10 m/s: 100 s per hop.
    fn chain_network(n: usize) -> Network {
        let mut builder = NetworkBuilder::new();
        let nodes: Vec<NodeId> = (0..n)
            .map(|i| builder.add_node(Coord::new(i as f64 * 1000.0, 0.0)))
            .collect();
        for pair in nodes.windows(2) {
            builder.add_bidirectional(pair[0], pair[1], 1000.0, 10.0);
        }
        builder.build()
    }

    /// 4x4 grid with irregular link speeds so shortest paths are non-trivial.
    fn irregular_grid() -> Network {
        let mut builder = NetworkBuilder::new();
        let mut nodes = Vec::new();
        for row in 0..4 {
            for col in 0..4 {
                nodes.push(builder.add_node(Coord::new(col as f64 * 500.0, row as f64 * 500.0)));
            }
        }
        let speed = |i: usize| 5.0 + (i % 7) as f64 * 2.0;
        let mut link_no = 0;
        for row in 0..4 {
            for col in 0..3 {
                let a = nodes[row * 4 + col];
                let b = nodes[row * 4 + col + 1];
                builder.add_bidirectional(a, b, 500.0, speed(link_no));
                link_no += 1;
            }
        }
        for row in 0..3 {
            for col in 0..4 {
                let a = nodes[row * 4 + col];
                let b = nodes[(row + 1) * 4 + col];
                builder.add_bidirectional(a, b, 500.0, speed(link_no));
                link_no += 1;
            }
        }
        builder.build()
    }

    fn context(network: &Network) -> RoutingContext<'_> {
        RoutingContext::new(network, &FreeSpeedCost, 8.0 * 3600.0)
    }

    #[test]
    fn chain_costs_are_hop_multiples() {
        let network = chain_network(4);
        let sink = AggregateSink::new(&network, (0..4).map(NodeId));
        let mut search = AggregatedTargetSearch::new(context(&network));

        search.run(NodeId(0), &sink);
        for hop in 0..4 {
            let cost = search.cost_to(NodeId(hop)).expect("reachable");
            assert!((cost - hop as f64 * 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn sink_deduplicates_members() {
        let network = chain_network(3);
        let sink = AggregateSink::new(&network, vec![NodeId(1), NodeId(1), NodeId(2), NodeId(1)]);
        assert_eq!(sink.members(), &[NodeId(1), NodeId(2)]);
        assert!(!sink.contains(NodeId(0)));
    }

    #[test]
    fn unreachable_member_yields_none() {
        // Node 2 is isolated: no links at all.
        let mut builder = NetworkBuilder::new();
        let a = builder.add_node(Coord::new(0.0, 0.0));
        let b = builder.add_node(Coord::new(1000.0, 0.0));
        let isolated = builder.add_node(Coord::new(9000.0, 9000.0));
        builder.add_bidirectional(a, b, 1000.0, 10.0);
        let network = builder.build();

        let sink = AggregateSink::new(&network, vec![b, isolated]);
        let mut search = AggregatedTargetSearch::new(context(&network));
        search.run(a, &sink);

        assert!(search.cost_to(b).is_some());
        assert_eq!(search.cost_to(isolated), None);
    }

    #[test]
    fn scratch_resets_between_origins() {
        let network = chain_network(5);
        let sink = AggregateSink::new(&network, (0..5).map(NodeId));
        let mut search = AggregatedTargetSearch::new(context(&network));

        search.run(NodeId(0), &sink);
        let from_start = search.cost_to(NodeId(4)).expect("reachable");
        search.run(NodeId(4), &sink);
        let from_end_to_start = search.cost_to(NodeId(0)).expect("reachable");
        let self_cost = search.cost_to(NodeId(4)).expect("origin label");

        assert!((from_start - 400.0).abs() < 1e-9);
        assert!((from_end_to_start - 400.0).abs() < 1e-9);
        assert_eq!(self_cost, 0.0);
    }

    /// Optimization correctness: the aggregated multi-target result must
    /// equal an independently computed single-pair shortest path.
    #[test]
    fn aggregated_search_matches_single_pair_dijkstra() {
        let network = irregular_grid();
        let all_nodes: Vec<NodeId> = (0..network.node_count()).map(NodeId).collect();
        let sink = AggregateSink::new(&network, all_nodes.iter().copied());
        let mut search = AggregatedTargetSearch::new(context(&network));

        // Independent oracle over the same graph, costs in integer microseconds.
        let oracle = |from: NodeId, to: NodeId| -> Option<u64> {
            pathfinding::directed::dijkstra::dijkstra(
                &from.0,
                |&node| {
                    network
                        .outgoing_links(NodeId(node))
                        .iter()
                        .map(|&index| {
                            let link = network.link(index);
                            let cost = FreeSpeedCost.link_travel_time(link, 0.0);
                            (link.to.0, (cost * 1e6).round() as u64)
                        })
                        .collect::<Vec<_>>()
                },
                |&node| node == to.0,
            )
            .map(|(_, cost)| cost)
        };

        for &origin in &all_nodes {
            search.run(origin, &sink);
            for &destination in &all_nodes {
                let aggregated = search.cost_to(destination).expect("grid is connected");
                let expected = oracle(origin, destination).expect("grid is connected") as f64 / 1e6;
                assert!(
                    (aggregated - expected).abs() < 1e-4,
                    "mismatch {origin:?} -> {destination:?}: {aggregated} vs {expected}"
                );
            }
        }
    }
}
