//! Interchangeable agent drivers
//!
//! Callers hand every driver the same per-tick context and get back a
//! [`DriveIntent`], whichever strategy steers the agent.

use super::controller::{
    speed_governor, steering_toward, AgentState, DriveIntent, PursuitController, RecoveryState,
};
use super::path_search::PathPlanner;
use super::types::Position;

/// World state visible to a driver for one tick
#[derive(Clone, Copy)]
pub struct DriveContext<'a> {
    pub agent: AgentState,
    /// Position of the entity being chased, if any
    pub target: Option<Position>,
    pub planner: &'a dyn PathPlanner,
}

pub trait Driver {
    fn drive(&mut self, delta_secs: f32, ctx: &DriveContext<'_>) -> DriveIntent;
}

impl Driver for PursuitController {
    fn drive(&mut self, delta_secs: f32, ctx: &DriveContext<'_>) -> DriveIntent {
        self.tick(delta_secs, &ctx.agent, ctx.target, ctx.planner)
    }
}

/// Heads straight for the target, ignoring the road network
#[derive(Debug, Clone, PartialEq)]
pub struct DirectPursuitDriver {
    pub target_speed: f32,
    pub max_steer_angle: f32,
    /// Holds position once this close to the target
    pub arrival_radius: f32,
}

impl Default for DirectPursuitDriver {
    fn default() -> Self {
        Self {
            target_speed: 20.0,
            max_steer_angle: 35.0,
            arrival_radius: 2.0,
        }
    }
}

impl Driver for DirectPursuitDriver {
    fn drive(&mut self, _delta_secs: f32, ctx: &DriveContext<'_>) -> DriveIntent {
        let Some(target) = ctx.target else {
            return DriveIntent::IDLE;
        };
        if ctx.agent.position.distance(&target) <= self.arrival_radius {
            return DriveIntent::IDLE;
        }

        DriveIntent::new(
            speed_governor(self.target_speed, ctx.agent.speed),
            steering_toward(&ctx.agent, &target, self.max_steer_angle),
        )
    }
}

/// The driver variants an agent can carry
#[derive(Debug, Clone)]
pub enum AgentDriver {
    Direct(DirectPursuitDriver),
    PathFollowing(PursuitController),
}

impl AgentDriver {
    pub fn as_path_follower(&self) -> Option<&PursuitController> {
        match self {
            AgentDriver::PathFollowing(controller) => Some(controller),
            AgentDriver::Direct(_) => None,
        }
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.as_path_follower()
            .map(PursuitController::recovery_state)
            .unwrap_or(RecoveryState::Normal)
    }
}

impl Driver for AgentDriver {
    fn drive(&mut self, delta_secs: f32, ctx: &DriveContext<'_>) -> DriveIntent {
        match self {
            AgentDriver::Direct(driver) => driver.drive(delta_secs, ctx),
            AgentDriver::PathFollowing(controller) => controller.drive(delta_secs, ctx),
        }
    }
}
