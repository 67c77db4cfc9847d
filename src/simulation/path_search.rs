//! Shortest-path queries over the road network
//!
//! World positions are snapped to their nearest nodes, the route is found
//! with A* over lane costs, and the lanes' waypoint polylines are joined into
//! a single path for agents to follow.

use log::{trace, warn};
use rand::{Rng, RngCore};
use std::collections::VecDeque;
use thiserror::Error;

use super::priority_queue::MinQueue;
use super::road_network::SimRoadNetwork;
use super::types::{polyline_length, NodeId, Position};

/// Why a path query produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("the road network has no nodes")]
    EmptyGraph,

    #[error("no route from {from:?} to {to:?}")]
    Disconnected { from: NodeId, to: NodeId },
}

/// An ordered polyline through the world
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimPath {
    pub points: Vec<Position>,
}

impl SimPath {
    pub fn new(points: Vec<Position>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// At least one segment to follow
    pub fn is_usable(&self) -> bool {
        self.points.len() >= 2
    }

    pub fn first(&self) -> Option<&Position> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Position> {
        self.points.last()
    }

    pub fn arc_length(&self) -> f32 {
        polyline_length(&self.points)
    }
}

/// Source of routes for agents
///
/// Implemented by [`SimRoadNetwork`]; agents borrow a planner for the
/// duration of a call instead of reaching for shared global state.
pub trait PathPlanner {
    fn find_path(&self, start: &Position, end: &Position) -> Option<SimPath>;

    /// A uniformly chosen destination for agents with nothing to chase
    fn random_goal(&self, rng: &mut dyn RngCore) -> Option<Position>;
}

impl PathPlanner for SimRoadNetwork {
    fn find_path(&self, start: &Position, end: &Position) -> Option<SimPath> {
        SimRoadNetwork::find_path(self, start, end)
    }

    fn random_goal(&self, rng: &mut dyn RngCore) -> Option<Position> {
        if self.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.node_count());
        self.nodes().get(index).map(|node| node.position)
    }
}

impl SimRoadNetwork {
    /// Shortest path by lane cost between two world positions
    ///
    /// Both positions snap to their nearest node. When they snap to the same
    /// node the result is the two-point path `[start, end]`.
    pub fn find_path(&self, start: &Position, end: &Position) -> Option<SimPath> {
        self.try_find_path(start, end).ok()
    }

    /// [`SimRoadNetwork::find_path`] with the reason for failure
    pub fn try_find_path(&self, start: &Position, end: &Position) -> Result<SimPath, PathError> {
        let start_node = self.nearest_node(start).ok_or(PathError::EmptyGraph)?;
        let end_node = self.nearest_node(end).ok_or(PathError::EmptyGraph)?;

        if start_node == end_node {
            return Ok(SimPath::new(vec![*start, *end]));
        }

        let node_path = match self.a_star(start_node, end_node) {
            Some(node_path) => node_path,
            None => {
                let node_path = self.breadth_first(start_node, end_node).ok_or(
                    PathError::Disconnected {
                        from: start_node,
                        to: end_node,
                    },
                )?;
                warn!(
                    "A* missed a route from {:?} to {:?} that breadth-first search found",
                    start_node, end_node
                );
                node_path
            }
        };

        Ok(self.stitch_lanes(&node_path))
    }

    /// Node sequence of the cheapest route, start and end included
    fn a_star(&self, start: NodeId, end: NodeId) -> Option<Vec<NodeId>> {
        let node_count = self.node_count();
        let end_pos = self.node_position(end)?;
        let heuristic = |id: NodeId| {
            self.node_position(id)
                .map(|pos| pos.distance(&end_pos))
                .unwrap_or(0.0)
        };

        let mut g_score = vec![f32::INFINITY; node_count];
        let mut f_score = vec![f32::INFINITY; node_count];
        let mut came_from: Vec<Option<NodeId>> = vec![None; node_count];
        let mut closed = vec![false; node_count];
        let mut open = MinQueue::with_capacity(node_count);

        g_score[start.index()] = 0.0;
        f_score[start.index()] = heuristic(start);
        open.enqueue(start, f_score[start.index()]);

        while let Some((current, priority)) = open.dequeue_with_priority() {
            let idx = current.index();
            if closed[idx] || priority > f_score[idx] {
                trace!("Skipping stale queue entry for {:?}", current);
                continue;
            }

            if current == end {
                return Some(walk_back(&came_from, end));
            }
            closed[idx] = true;

            for lane in self.outgoing(current) {
                let neighbor = lane.to.index();
                if closed[neighbor] {
                    continue;
                }

                let tentative = g_score[idx] + lane.cost();
                if tentative < g_score[neighbor] {
                    came_from[neighbor] = Some(current);
                    g_score[neighbor] = tentative;
                    f_score[neighbor] = tentative + heuristic(lane.to);
                    open.enqueue(lane.to, f_score[neighbor]);
                }
            }
        }

        None
    }

    /// Unweighted reachability search; any route, ignoring cost
    fn breadth_first(&self, start: NodeId, end: NodeId) -> Option<Vec<NodeId>> {
        let mut visited = vec![false; self.node_count()];
        let mut came_from: Vec<Option<NodeId>> = vec![None; self.node_count()];
        let mut frontier = VecDeque::new();

        visited[start.index()] = true;
        frontier.push_back(start);

        while let Some(current) = frontier.pop_front() {
            if current == end {
                return Some(walk_back(&came_from, end));
            }

            for lane in self.outgoing(current) {
                let next = lane.to.index();
                if !visited[next] {
                    visited[next] = true;
                    came_from[next] = Some(current);
                    frontier.push_back(lane.to);
                }
            }
        }

        None
    }

    /// Join the waypoint polylines of the lanes along a node route
    fn stitch_lanes(&self, node_path: &[NodeId]) -> SimPath {
        let mut points: Vec<Position> = Vec::new();

        for pair in node_path.windows(2) {
            let Some(lane) = self.lane_between(pair[0], pair[1]) else {
                continue;
            };

            let mut waypoints = lane.waypoints.iter();
            if let (Some(last), Some(first)) = (points.last(), lane.waypoints.first()) {
                if last == first {
                    waypoints.next();
                }
            }
            points.extend(waypoints);
        }

        SimPath::new(points)
    }
}

fn walk_back(came_from: &[Option<NodeId>], end: NodeId) -> Vec<NodeId> {
    let mut route = vec![end];
    let mut current = end;
    while let Some(prev) = came_from[current.index()] {
        route.push(prev);
        current = prev;
    }
    route.reverse();
    route
}
