//! Main simulation world that ties everything together
//!
//! Owns one road network and any number of agents, and advances them on a
//! fixed timestep. Vehicle motion here is a bare kinematic stand-in so the
//! controllers can be run headless; it is not a physics model.

use anyhow::{Context, Result};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use super::city::generate_grid_city;
use super::controller::{AgentState, ControllerConfig, DriveIntent, PursuitController};
use super::driver::{AgentDriver, DirectPursuitDriver, DriveContext, Driver};
use super::road_network::SimRoadNetwork;
use super::types::{AgentId, Position, SimId};

/// Forward acceleration at full throttle (units/s^2)
pub const VEHICLE_ACCELERATION: f32 = 8.0;

/// Fraction of speed lost per second when coasting
pub const VEHICLE_DRAG: f32 = 0.5;

/// Yaw rate at full steering and speed (radians/s)
pub const VEHICLE_TURN_RATE: f32 = 1.5;

/// Speed above which the full turn rate applies
pub const VEHICLE_FULL_TURN_SPEED: f32 = 5.0;

pub const VEHICLE_MAX_SPEED: f32 = 25.0;
pub const VEHICLE_MAX_REVERSE_SPEED: f32 = 5.0;

/// Default speed of the entity the agents chase
pub const TARGET_SPEED: f32 = 6.0;

/// Minimal kinematic vehicle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleBody {
    pub position: Position,
    /// Heading about +y; 0 faces +z and positive turns toward +x
    pub yaw: f32,
    pub speed: f32,
    /// A blocked vehicle cannot move forward
    pub blocked: bool,
}

impl VehicleBody {
    pub fn new(position: Position, yaw: f32) -> Self {
        Self {
            position,
            yaw,
            speed: 0.0,
            blocked: false,
        }
    }

    pub fn forward(&self) -> Position {
        Position::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    pub fn state(&self) -> AgentState {
        AgentState::new(self.position, self.forward(), self.speed)
    }

    /// Apply intents for one step; returns the distance covered
    pub fn integrate(&mut self, intent: &DriveIntent, delta_secs: f32) -> f32 {
        if intent.throttle == 0.0 {
            self.speed -= self.speed * (VEHICLE_DRAG * delta_secs).min(1.0);
        } else {
            self.speed += intent.throttle * VEHICLE_ACCELERATION * delta_secs;
        }
        if intent.brake {
            self.speed = 0.0;
        }
        self.speed = self
            .speed
            .clamp(-VEHICLE_MAX_REVERSE_SPEED, VEHICLE_MAX_SPEED);
        if self.blocked && self.speed > 0.0 {
            self.speed = 0.0;
        }

        let turn_factor = (self.speed.abs() / VEHICLE_FULL_TURN_SPEED).min(1.0);
        self.yaw += intent.steering
            * VEHICLE_TURN_RATE
            * turn_factor
            * self.speed.signum()
            * delta_secs;

        let step = self.speed * delta_secs;
        self.position = self.position + self.forward() * step;
        step.abs()
    }
}

/// Which driver a spawned agent gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    Direct,
    PathFollowing,
}

/// An agent in the simulation
#[derive(Debug, Clone)]
pub struct SimAgent {
    pub id: AgentId,
    pub body: VehicleBody,
    pub driver: AgentDriver,
    pub last_intent: DriveIntent,
    pub distance_travelled: f32,
}

/// The entity agents chase: wanders between random intersections
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PursuitTarget {
    pub position: Position,
    pub goal: Position,
    /// Units per second; zero keeps the target in place
    pub speed: f32,
}

impl PursuitTarget {
    pub fn stationary(position: Position) -> Self {
        Self {
            position,
            goal: position,
            speed: 0.0,
        }
    }
}

/// Aggregate numbers for logging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSummary {
    pub time: f32,
    pub agents: usize,
    pub nodes: usize,
    pub lanes: usize,
    pub components: usize,
    pub isolated_nodes: usize,
    pub replans: u64,
    pub recoveries: u64,
    pub recovering_agents: usize,
    pub distance_travelled: f32,
}

/// The main simulation world
pub struct SimWorld {
    /// Road network shared read-only by all agents
    pub road_network: SimRoadNetwork,

    pub agents: HashMap<AgentId, SimAgent>,

    pub target: Option<PursuitTarget>,

    pub controller_config: ControllerConfig,

    next_id: usize,

    /// Simulation time
    pub time: f32,

    /// Optional seeded RNG for reproducible simulations
    rng: Option<StdRng>,
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SimWorld {
    fn new_internal(rng: Option<StdRng>) -> Self {
        Self {
            road_network: SimRoadNetwork::new(),
            agents: HashMap::new(),
            target: None,
            controller_config: ControllerConfig::default(),
            next_id: 0,
            time: 0.0,
            rng,
        }
    }

    pub fn new() -> Self {
        Self::new_internal(None)
    }

    /// Create a new SimWorld with a seeded RNG for reproducible simulations
    pub fn new_with_seed(seed: u64) -> Self {
        Self::new_internal(Some(StdRng::seed_from_u64(seed)))
    }

    /// Grid city with a wandering target, ready for agents
    pub fn create_test_world(grid_size: usize, spacing: f32, seed: Option<u64>) -> Self {
        let mut world = match seed {
            Some(seed) => Self::new_with_seed(seed),
            None => Self::new(),
        };
        generate_grid_city(&mut world.road_network, grid_size, grid_size, spacing);
        if let Some(position) = world.random_node_position() {
            world.target = Some(PursuitTarget {
                position,
                goal: position,
                speed: TARGET_SPEED,
            });
        }
        world
    }

    fn random_index(&mut self, len: usize) -> usize {
        match &mut self.rng {
            Some(rng) => rng.random_range(0..len),
            None => rand::rng().random_range(0..len),
        }
    }

    fn random_seed(&mut self) -> u64 {
        match &mut self.rng {
            Some(rng) => rng.random(),
            None => rand::rng().random(),
        }
    }

    fn random_node_position(&mut self) -> Option<Position> {
        if self.road_network.is_empty() {
            return None;
        }
        let index = self.random_index(self.road_network.node_count());
        self.road_network.nodes().get(index).map(|node| node.position)
    }

    fn next_sim_id(&mut self) -> SimId {
        let id = SimId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Spawn an agent at a position
    ///
    /// Path followers request their first path immediately.
    pub fn spawn_agent(&mut self, position: Position, yaw: f32, kind: DriverKind) -> AgentId {
        let id = AgentId(self.next_sim_id());
        let body = VehicleBody::new(position, yaw);

        let driver = match kind {
            DriverKind::Direct => AgentDriver::Direct(DirectPursuitDriver {
                target_speed: self.controller_config.target_speed,
                max_steer_angle: self.controller_config.max_steer_angle,
                ..DirectPursuitDriver::default()
            }),
            DriverKind::PathFollowing => {
                let seed = self.random_seed();
                let mut controller =
                    PursuitController::new_with_seed(self.controller_config.clone(), seed);
                let target = self.target.map(|target| target.position);
                controller.replan(&body.state(), target, &self.road_network);
                AgentDriver::PathFollowing(controller)
            }
        };

        self.agents.insert(
            id,
            SimAgent {
                id,
                body,
                driver,
                last_intent: DriveIntent::IDLE,
                distance_travelled: 0.0,
            },
        );
        id
    }

    /// Spawn an agent on a random intersection
    pub fn spawn_agent_at_random_node(&mut self, kind: DriverKind) -> Result<AgentId> {
        let position = self
            .random_node_position()
            .context("Road network has no nodes to spawn on")?;
        let yaw = self.random_index(4) as f32 * std::f32::consts::FRAC_PI_2;
        Ok(self.spawn_agent(position, yaw, kind))
    }

    pub fn agent(&self, id: AgentId) -> Result<&SimAgent> {
        self.agents
            .get(&id)
            .with_context(|| format!("Agent {:?} not found", id))
    }

    /// Mark an agent's vehicle as blocked (or free it)
    pub fn set_blocked(&mut self, id: AgentId, blocked: bool) -> Result<()> {
        let agent = self
            .agents
            .get_mut(&id)
            .with_context(|| format!("Agent {:?} not found", id))?;
        agent.body.blocked = blocked;
        Ok(())
    }

    fn update_target(&mut self, delta_secs: f32) {
        let Some(mut target) = self.target else {
            return;
        };

        if target.speed <= 0.0 {
            return;
        }

        let to_goal = target.goal - target.position;
        let distance = to_goal.length();
        let step = target.speed * delta_secs;
        if distance <= step {
            target.position = target.goal;
            if let Some(goal) = self.random_node_position() {
                target.goal = goal;
            }
        } else {
            target.position = target.position + to_goal * (step / distance);
        }

        self.target = Some(target);
    }

    /// Main simulation tick
    pub fn tick(&mut self, delta_secs: f32) {
        self.time += delta_secs;
        self.update_target(delta_secs);

        let target = self.target.map(|target| target.position);
        for agent in self.agents.values_mut() {
            let ctx = DriveContext {
                agent: agent.body.state(),
                target,
                planner: &self.road_network,
            };
            let intent = agent.driver.drive(delta_secs, &ctx);
            agent.distance_travelled += agent.body.integrate(&intent, delta_secs);
            agent.last_intent = intent;
        }
    }

    pub fn summary(&self) -> WorldSummary {
        let controllers: Vec<&PursuitController> = self
            .agents
            .values()
            .filter_map(|agent| agent.driver.as_path_follower())
            .collect();

        WorldSummary {
            time: self.time,
            agents: self.agents.len(),
            nodes: self.road_network.node_count(),
            lanes: self.road_network.lane_count(),
            components: self.road_network.component_count(),
            isolated_nodes: self.road_network.isolated_node_count(),
            replans: controllers.iter().map(|c| c.replan_count()).sum(),
            recoveries: controllers.iter().map(|c| c.recovery_count()).sum(),
            recovering_agents: self
                .agents
                .values()
                .filter(|agent| !agent.driver.recovery_state().is_normal())
                .count(),
            distance_travelled: self
                .agents
                .values()
                .map(|agent| agent.distance_travelled)
                .sum(),
        }
    }

    /// Log a summary of the world state
    pub fn print_summary(&self) {
        let summary = self.summary();
        info!("Time: {:.1}s", summary.time);
        info!("Active agents: {}", summary.agents);
        info!("Total nodes: {}", summary.nodes);
        info!("Total lanes: {}", summary.lanes);
        info!("Connected components: {}", summary.components);
        info!("Isolated nodes: {}", summary.isolated_nodes);
        info!("Total replans: {}", summary.replans);
        info!("Total recoveries: {}", summary.recoveries);
        info!("Agents recovering: {}", summary.recovering_agents);
        info!("Distance travelled: {:.1}", summary.distance_travelled);
    }
}
