//! Road network graph store
//!
//! Nodes and lanes live in flat, id-indexed collections. Every cross
//! reference is an id resolved through those collections, so the per-node
//! adjacency lists can always be rebuilt from `(nodes, lanes)` alone.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use super::intersection::SimNode;
use super::types::{
    polyline_length, LaneId, NodeId, Position, SimId, SimLane, DEFAULT_SPEED_LIMIT,
};

/// Reasons a bulk-loaded `(nodes, lanes)` pair cannot form a valid graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node ids are not dense: expected id {expected}, found {found}")]
    NonDenseNodeIds { expected: usize, found: usize },

    #[error("lane ids are not dense: expected id {expected}, found {found}")]
    NonDenseLaneIds { expected: usize, found: usize },

    #[error("lane {lane:?} references missing node {node:?}")]
    DanglingLane { lane: LaneId, node: NodeId },

    #[error("lane {lane:?} has {points} polyline points, at least 2 are required")]
    DegenerateLane { lane: LaneId, points: usize },
}

/// Directed road network: intersections joined by one-way lanes
///
/// Populated once per generation cycle, then shared read-only by every
/// agent. A two-way street is two opposing lanes.
#[derive(Debug, Clone, Default)]
pub struct SimRoadNetwork {
    nodes: Vec<SimNode>,
    lanes: Vec<SimLane>,
}

impl SimRoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk load from node and lane collections, e.g. a snapshot copy
    ///
    /// Nodes are re-keyed by id, lane endpoints and polylines are validated
    /// and all adjacency lists are rebuilt, so any adjacency carried in by
    /// the copies is discarded.
    pub fn from_parts(
        mut nodes: Vec<SimNode>,
        mut lanes: Vec<SimLane>,
    ) -> Result<Self, GraphError> {
        nodes.sort_by_key(|node| node.id);
        for (expected, node) in nodes.iter().enumerate() {
            if node.id.index() != expected {
                return Err(GraphError::NonDenseNodeIds {
                    expected,
                    found: node.id.index(),
                });
            }
        }

        lanes.sort_by_key(|lane| lane.id);
        for (expected, lane) in lanes.iter_mut().enumerate() {
            if lane.id.index() != expected {
                return Err(GraphError::NonDenseLaneIds {
                    expected,
                    found: lane.id.index(),
                });
            }
            for node in [lane.from, lane.to] {
                if node.index() >= nodes.len() {
                    return Err(GraphError::DanglingLane {
                        lane: lane.id,
                        node,
                    });
                }
            }
            if lane.waypoints.len() < 2 {
                return Err(GraphError::DegenerateLane {
                    lane: lane.id,
                    points: lane.waypoints.len(),
                });
            }
            lane.length = polyline_length(&lane.waypoints);
        }

        let mut network = Self { nodes, lanes };
        network.rebuild_adjacency();
        Ok(network)
    }

    /// Hand back the authoritative collections
    pub fn into_parts(self) -> (Vec<SimNode>, Vec<SimLane>) {
        (self.nodes, self.lanes)
    }

    /// Appends a node with the next sequential id
    pub fn create_node(&mut self, position: Position) -> NodeId {
        let id = NodeId(SimId(self.nodes.len()));
        self.nodes.push(SimNode::new(id, position));
        id
    }

    /// Appends a directed lane with the default speed limit
    ///
    /// See [`SimRoadNetwork::create_lane_with_speed`].
    pub fn create_lane(&mut self, from: NodeId, to: NodeId, waypoints: Vec<Position>) -> LaneId {
        self.create_lane_with_speed(from, to, waypoints, DEFAULT_SPEED_LIMIT)
    }

    /// Appends a directed lane and registers it with both endpoints
    ///
    /// A polyline with fewer than two points is replaced by the straight
    /// segment between the endpoint nodes.
    ///
    /// # Panics
    /// If `from` or `to` is not a node of this network.
    pub fn create_lane_with_speed(
        &mut self,
        from: NodeId,
        to: NodeId,
        waypoints: Vec<Position>,
        speed_limit: f32,
    ) -> LaneId {
        assert!(
            from.index() < self.nodes.len(),
            "lane source {:?} is not a node of this network",
            from
        );
        assert!(
            to.index() < self.nodes.len(),
            "lane destination {:?} is not a node of this network",
            to
        );

        let waypoints = if waypoints.len() < 2 {
            vec![self.nodes[from.index()].position, self.nodes[to.index()].position]
        } else {
            waypoints
        };

        let id = LaneId(SimId(self.lanes.len()));
        self.lanes
            .push(SimLane::new(id, from, to, waypoints, speed_limit));
        self.nodes[from.index()].outgoing.push(id);
        self.nodes[to.index()].incoming.push(id);
        id
    }

    /// Adds a lane in each direction; the back lane follows the reversed polyline
    pub fn create_two_way_lane(
        &mut self,
        a: NodeId,
        b: NodeId,
        waypoints: Vec<Position>,
        speed_limit: f32,
    ) -> (LaneId, LaneId) {
        let reversed: Vec<Position> = waypoints.iter().rev().copied().collect();
        let forward = self.create_lane_with_speed(a, b, waypoints, speed_limit);
        let backward = self.create_lane_with_speed(b, a, reversed, speed_limit);
        (forward, backward)
    }

    /// Empties the network ahead of regeneration
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.lanes.clear();
    }

    /// Re-derives every node's outgoing/incoming lists from the lane collection
    ///
    /// Endpoints are ids resolved through `nodes`, so there are no stale
    /// node copies to rebind. Idempotent.
    pub fn rebuild_adjacency(&mut self) {
        for node in &mut self.nodes {
            node.clear_adjacency();
        }

        for lane in &self.lanes {
            self.nodes[lane.from.index()].outgoing.push(lane.id);
            self.nodes[lane.to.index()].incoming.push(lane.id);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&SimNode> {
        self.nodes.get(id.index())
    }

    pub fn lane(&self, id: LaneId) -> Option<&SimLane> {
        self.lanes.get(id.index())
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    pub fn lanes(&self) -> &[SimLane] {
        &self.lanes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_position(&self, id: NodeId) -> Option<Position> {
        self.node(id).map(|node| node.position)
    }

    /// Lanes leaving a node, in insertion order
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &SimLane> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|node| node.outgoing.iter())
            .map(move |lane_id| &self.lanes[lane_id.index()])
    }

    /// Lanes arriving at a node, in insertion order
    pub fn incoming(&self, id: NodeId) -> impl Iterator<Item = &SimLane> + '_ {
        self.node(id)
            .into_iter()
            .flat_map(|node| node.incoming.iter())
            .map(move |lane_id| &self.lanes[lane_id.index()])
    }

    /// First lane in `from`'s outgoing list that ends at `to`
    pub fn lane_between(&self, from: NodeId, to: NodeId) -> Option<&SimLane> {
        self.outgoing(from).find(|lane| lane.to == to)
    }

    /// Closest node by straight-line distance; the lowest id wins ties
    pub fn nearest_node(&self, position: &Position) -> Option<NodeId> {
        let mut best: Option<(NodeId, f32)> = None;
        for node in &self.nodes {
            let dist_sq = node.position.distance_squared(position);
            match best {
                Some((_, best_dist)) if dist_sq >= best_dist => {}
                _ => best = Some((node.id, dist_sq)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// Topology-only view for diagnostics; graph indices equal node ids
    pub fn connectivity_graph(&self) -> DiGraph<NodeId, LaneId> {
        let mut graph = DiGraph::with_capacity(self.nodes.len(), self.lanes.len());
        for node in &self.nodes {
            graph.add_node(node.id);
        }
        for lane in &self.lanes {
            graph.add_edge(
                NodeIndex::new(lane.from.index()),
                NodeIndex::new(lane.to.index()),
                lane.id,
            );
        }
        graph
    }

    /// Number of strongly connected components
    pub fn component_count(&self) -> usize {
        kosaraju_scc(&self.connectivity_graph()).len()
    }

    /// Nodes no lane starts or ends at
    pub fn isolated_node_count(&self) -> usize {
        self.nodes.iter().filter(|node| !node.has_lanes()).count()
    }
}
