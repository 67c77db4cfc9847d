//! Road-network pathfinding and pursuit control
//!
//! Everything here runs without a game engine: a directed lane graph, a
//! shortest-path search over it, and per-agent controllers that follow the
//! resulting paths. It can be driven headless from the console or tests.

mod city;
mod controller;
mod driver;
mod intersection;
mod path_search;
mod priority_queue;
mod road_network;
mod types;
mod world;

pub use city::generate_grid_city;
pub use controller::{
    speed_governor, steering_toward, AgentState, ControllerConfig, DriveIntent,
    PursuitController, RecoveryState,
};
pub use driver::{AgentDriver, DirectPursuitDriver, DriveContext, Driver};
pub use intersection::SimNode;
pub use path_search::{PathError, PathPlanner, SimPath};
pub use priority_queue::MinQueue;
pub use road_network::{GraphError, SimRoadNetwork};
pub use types::{
    polyline_length, AgentId, LaneId, NodeId, Position, SimId, SimLane, DEFAULT_SPEED_LIMIT,
    LANE_TURN_BIAS,
};
pub use world::{
    DriverKind, PursuitTarget, SimAgent, SimWorld, VehicleBody, WorldSummary, TARGET_SPEED,
    VEHICLE_ACCELERATION, VEHICLE_MAX_SPEED,
};
