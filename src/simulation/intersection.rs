//! Graph nodes (intersections) of the road network
//!
//! Adjacency lists are a derived index over the store's lane collection and
//! hold lane ids only.

use super::types::{LaneId, NodeId, Position};

/// An intersection in the road network
#[derive(Debug, Clone)]
pub struct SimNode {
    pub id: NodeId,
    pub position: Position,
    /// Lanes that start at this node, in insertion order
    pub outgoing: Vec<LaneId>,
    /// Lanes that end at this node, in insertion order
    pub incoming: Vec<LaneId>,
}

impl SimNode {
    pub fn new(id: NodeId, position: Position) -> Self {
        Self {
            id,
            position,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        }
    }

    /// Drop both adjacency lists
    pub fn clear_adjacency(&mut self) {
        self.outgoing.clear();
        self.incoming.clear();
    }

    /// Whether any lane touches this node
    pub fn has_lanes(&self) -> bool {
        !self.outgoing.is_empty() || !self.incoming.is_empty()
    }
}
