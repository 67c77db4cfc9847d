//! Core types for the road network and its agents
//!
//! These are plain value types with no engine dependencies.

use std::ops::{Add, Mul, Sub};

/// A unique identifier for simulation entities
/// This is a simple wrapper around a usize for type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimId(pub usize);

/// A wrapper type for node (intersection) IDs
///
/// Node ids are dense and zero-based: a node's id is also its index in the
/// owning store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub SimId);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 .0
    }
}

/// A wrapper type for lane (directed edge) IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(pub SimId);

impl LaneId {
    pub fn index(self) -> usize {
        self.0 .0
    }
}

/// A wrapper type for agent IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(pub SimId);

/// A 3D position (or direction) in world space, y up
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ZERO: Position = Position::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        self.distance_squared(other).sqrt()
    }

    pub fn distance_squared(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn dot(&self, other: &Position) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(&self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or zero for a zero-length vector
    pub fn normalize_or_zero(&self) -> Position {
        let len = self.length();
        if len > f32::EPSILON {
            *self * (1.0 / len)
        } else {
            Position::ZERO
        }
    }

    pub fn lerp(&self, other: &Position, t: f32) -> Position {
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Position {
    type Output = Position;

    fn sub(self, rhs: Position) -> Position {
        Position::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Position {
    type Output = Position;

    fn mul(self, rhs: f32) -> Position {
        Position::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Total length of a polyline
pub fn polyline_length(points: &[Position]) -> f32 {
    points
        .windows(2)
        .map(|pair| pair[0].distance(&pair[1]))
        .sum()
}

/// A directed lane connecting two nodes
#[derive(Debug, Clone)]
pub struct SimLane {
    pub id: LaneId,
    pub from: NodeId,
    pub to: NodeId,
    /// Ordered polyline, endpoints included
    pub waypoints: Vec<Position>,
    pub speed_limit: f32,
    /// Cached polyline arc length
    pub length: f32,
}

impl SimLane {
    pub fn new(
        id: LaneId,
        from: NodeId,
        to: NodeId,
        waypoints: Vec<Position>,
        speed_limit: f32,
    ) -> Self {
        let length = polyline_length(&waypoints);
        Self {
            id,
            from,
            to,
            waypoints,
            speed_limit,
            length,
        }
    }

    /// Search cost: arc length plus a fixed per-lane bias, so routes with
    /// fewer, longer hops win over many short turns of the same length
    pub fn cost(&self) -> f32 {
        self.length + LANE_TURN_BIAS
    }
}

/// Flat cost added to every lane traversal
pub const LANE_TURN_BIAS: f32 = 2.0;

/// Speed limit used when the generator does not supply one (world units/s)
pub const DEFAULT_SPEED_LIMIT: f32 = 15.0;
