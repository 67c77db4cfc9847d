//! Per-agent path-following controller
//!
//! Each controller owns a cached path that it refreshes on a fixed interval
//! and, every tick, turns the agent's kinematic state into throttle and
//! steering intents. When the agent is pushing hard but not moving, a timed
//! reverse-then-forward maneuver takes over until it can make progress.

use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::path_search::{PathPlanner, SimPath};
use super::types::Position;

/// Countdowns within this of zero count as expired
const TIMER_EPSILON: f32 = 1e-4;

/// Segments shorter than this are skipped
const MIN_SEGMENT_LENGTH: f32 = 1e-4;

/// Tuning for [`PursuitController`]
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Arc length ahead of the agent's path position to steer toward
    pub lookahead_distance: f32,
    /// Steering angle (degrees) that maps to full steering intent
    pub max_steer_angle: f32,
    pub target_speed: f32,
    /// Seconds between path requests
    pub replan_interval: f32,
    /// Distance at which a patrol goal counts as reached
    pub patrol_arrival_radius: f32,
    pub stuck_throttle_threshold: f32,
    pub stuck_speed_threshold: f32,
    /// Seconds of pushing without moving before recovery starts
    pub stuck_time_threshold: f32,
    pub reverse_duration: f32,
    pub reverse_throttle: f32,
    pub forward_recover_duration: f32,
    pub forward_recover_throttle: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lookahead_distance: 6.0,
            max_steer_angle: 35.0,
            target_speed: 20.0,
            replan_interval: 1.0,
            patrol_arrival_radius: 3.0,
            stuck_throttle_threshold: 0.5,
            stuck_speed_threshold: 0.5,
            stuck_time_threshold: 2.0,
            reverse_duration: 1.25,
            reverse_throttle: -0.6,
            forward_recover_duration: 0.75,
            forward_recover_throttle: 0.4,
        }
    }
}

/// Kinematic state read from the vehicle each tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentState {
    pub position: Position,
    /// Facing direction; only the horizontal part is used
    pub forward: Position,
    pub speed: f32,
}

impl AgentState {
    pub fn new(position: Position, forward: Position, speed: f32) -> Self {
        Self {
            position,
            forward,
            speed,
        }
    }

    fn flat_forward(&self) -> Position {
        Position::new(self.forward.x, 0.0, self.forward.z).normalize_or_zero()
    }

    /// Unit vector to the agent's right (y up, +z forward, +x right)
    pub fn right(&self) -> Position {
        let forward = self.flat_forward();
        Position::new(forward.z, 0.0, -forward.x)
    }

    /// World point in the agent's local frame
    pub fn to_local(&self, point: &Position) -> Position {
        let offset = *point - self.position;
        Position::new(
            offset.dot(&self.right()),
            offset.y,
            offset.dot(&self.flat_forward()),
        )
    }
}

/// Control outputs handed to the vehicle layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveIntent {
    /// In [-1, 1]; negative reverses
    pub throttle: f32,
    /// In [-1, 1]; positive turns right
    pub steering: f32,
    /// Never set by the controllers in this crate
    pub brake: bool,
}

impl DriveIntent {
    pub const IDLE: DriveIntent = DriveIntent {
        throttle: 0.0,
        steering: 0.0,
        brake: false,
    };

    pub fn new(throttle: f32, steering: f32) -> Self {
        Self {
            throttle,
            steering,
            brake: false,
        }
    }
}

/// Stuck-recovery state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecoveryState {
    Normal,
    /// Backing away from an obstacle; `remaining` seconds left
    Reversing { remaining: f32 },
    /// Retrying the original heading gently; `remaining` seconds left
    ForwardRecover { remaining: f32 },
}

impl RecoveryState {
    pub fn is_normal(&self) -> bool {
        matches!(self, RecoveryState::Normal)
    }
}

/// Steering intent that points the agent at `target`
pub fn steering_toward(agent: &AgentState, target: &Position, max_steer_angle: f32) -> f32 {
    let local = agent.to_local(target);
    let angle = local.x.atan2(local.z).to_degrees();
    (angle / max_steer_angle).clamp(-1.0, 1.0)
}

/// Proportional speed governor: 1 far below target, 0 at or above it
pub fn speed_governor(target_speed: f32, current_speed: f32) -> f32 {
    ((target_speed - current_speed) / target_speed.max(1.0)).clamp(0.0, 1.0)
}

/// Follows a re-planned path toward a pursuit target or patrol goal
#[derive(Debug, Clone)]
pub struct PursuitController {
    config: ControllerConfig,
    path: SimPath,
    current_segment: usize,
    replan_timer: f32,
    stuck_time: f32,
    recovery: RecoveryState,
    last_steering: f32,
    patrol_goal: Option<Position>,
    replan_count: u64,
    recovery_count: u64,

    /// Optional seeded RNG for reproducible patrol goals
    rng: Option<StdRng>,
}

impl PursuitController {
    fn new_internal(config: ControllerConfig, rng: Option<StdRng>) -> Self {
        Self {
            replan_timer: config.replan_interval,
            config,
            path: SimPath::default(),
            current_segment: 0,
            stuck_time: 0.0,
            recovery: RecoveryState::Normal,
            last_steering: 0.0,
            patrol_goal: None,
            replan_count: 0,
            recovery_count: 0,
            rng,
        }
    }

    pub fn new(config: ControllerConfig) -> Self {
        Self::new_internal(config, None)
    }

    /// Create a controller with a seeded RNG for reproducible patrols
    pub fn new_with_seed(config: ControllerConfig, seed: u64) -> Self {
        Self::new_internal(config, Some(StdRng::seed_from_u64(seed)))
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn path(&self) -> &SimPath {
        &self.path
    }

    pub fn current_segment(&self) -> usize {
        self.current_segment
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery
    }

    pub fn stuck_time(&self) -> f32 {
        self.stuck_time
    }

    pub fn patrol_goal(&self) -> Option<Position> {
        self.patrol_goal
    }

    /// Number of path requests issued so far
    pub fn replan_count(&self) -> u64 {
        self.replan_count
    }

    /// Number of times the stuck maneuver has started
    pub fn recovery_count(&self) -> u64 {
        self.recovery_count
    }

    /// One simulation step: replan if due, then compute intents
    pub fn tick(
        &mut self,
        delta_secs: f32,
        agent: &AgentState,
        target: Option<Position>,
        planner: &dyn PathPlanner,
    ) -> DriveIntent {
        self.replan_timer -= delta_secs;
        if self.replan_timer <= TIMER_EPSILON {
            // Carry the overshoot so the schedule doesn't drift with dt
            self.replan_timer = (self.replan_timer + self.config.replan_interval).max(0.0);
            self.replan(agent, target, planner);
        }

        self.update(delta_secs, agent)
    }

    /// Request a fresh path toward the target, or the patrol goal without one
    ///
    /// Returns whether the cached path was replaced. A failed or degenerate
    /// result keeps the previous path.
    pub fn replan(
        &mut self,
        agent: &AgentState,
        target: Option<Position>,
        planner: &dyn PathPlanner,
    ) -> bool {
        let goal = match target {
            Some(target) => {
                self.patrol_goal = None;
                target
            }
            None => match self.patrol_goal_for(agent.position, planner) {
                Some(goal) => goal,
                None => return false,
            },
        };

        self.replan_count += 1;
        match planner.find_path(&agent.position, &goal) {
            Some(path) => self.set_path(path),
            None => {
                debug!(
                    "No path from {:?} to {:?}; keeping the cached path",
                    agent.position, goal
                );
                false
            }
        }
    }

    /// Replace the cached path if it has at least one segment
    pub fn set_path(&mut self, path: SimPath) -> bool {
        if !path.is_usable() {
            return false;
        }
        self.path = path;
        self.current_segment = 0;
        true
    }

    fn patrol_goal_for(&mut self, position: Position, planner: &dyn PathPlanner) -> Option<Position> {
        let reached = self
            .patrol_goal
            .map(|goal| goal.distance(&position) <= self.config.patrol_arrival_radius)
            .unwrap_or(true);

        if reached {
            let next = match &mut self.rng {
                Some(rng) => planner.random_goal(rng),
                None => planner.random_goal(&mut rand::rng()),
            };
            if next.is_some() {
                self.patrol_goal = next;
            }
        }

        self.patrol_goal
    }

    /// Per-tick control from the cached path; does not replan
    pub fn update(&mut self, delta_secs: f32, agent: &AgentState) -> DriveIntent {
        match self.recovery {
            RecoveryState::Reversing { remaining } => {
                let remaining = remaining - delta_secs;
                self.recovery = if remaining <= TIMER_EPSILON {
                    debug!("Reverse finished, retrying forward");
                    RecoveryState::ForwardRecover {
                        remaining: self.config.forward_recover_duration,
                    }
                } else {
                    RecoveryState::Reversing { remaining }
                };
                DriveIntent::new(self.config.reverse_throttle, -self.last_steering)
            }
            RecoveryState::ForwardRecover { remaining } => {
                let steering = self
                    .pursue(agent)
                    .map(|(_, steering)| steering)
                    .unwrap_or(0.0);
                let remaining = remaining - delta_secs;
                self.recovery = if remaining <= TIMER_EPSILON {
                    debug!("Recovery finished");
                    RecoveryState::Normal
                } else {
                    RecoveryState::ForwardRecover { remaining }
                };
                DriveIntent::new(self.config.forward_recover_throttle, steering)
            }
            RecoveryState::Normal => {
                let Some((throttle, steering)) = self.pursue(agent) else {
                    self.stuck_time = 0.0;
                    return DriveIntent::IDLE;
                };
                self.detect_stuck(delta_secs, throttle, agent.speed);
                DriveIntent::new(throttle, steering)
            }
        }
    }

    fn detect_stuck(&mut self, delta_secs: f32, throttle: f32, speed: f32) {
        let trying_hard = throttle > self.config.stuck_throttle_threshold;
        let not_moving = speed.abs() < self.config.stuck_speed_threshold;
        if !(trying_hard && not_moving) {
            self.stuck_time = 0.0;
            return;
        }

        self.stuck_time += delta_secs;
        if self.stuck_time > self.config.stuck_time_threshold {
            debug!("Stuck for {:.2}s, reversing", self.stuck_time);
            self.stuck_time = 0.0;
            self.recovery_count += 1;
            self.recovery = RecoveryState::Reversing {
                remaining: self.config.reverse_duration,
            };
        }
    }

    /// Throttle and steering toward the lookahead point, if there is a path
    fn pursue(&mut self, agent: &AgentState) -> Option<(f32, f32)> {
        if !self.path.is_usable() {
            return None;
        }

        self.advance_segment(&agent.position);
        let target = self.lookahead_point(&agent.position);
        let steering = steering_toward(agent, &target, self.config.max_steer_angle);
        let throttle = speed_governor(self.config.target_speed, agent.speed);
        self.last_steering = steering;
        Some((throttle, steering))
    }

    /// Move past every segment whose end the agent has already passed
    fn advance_segment(&mut self, position: &Position) {
        let points = &self.path.points;
        while self.current_segment + 2 < points.len() {
            let start = points[self.current_segment];
            let segment = points[self.current_segment + 1] - start;
            let length = segment.length();
            let passed = length < MIN_SEGMENT_LENGTH
                || (*position - start).dot(&(segment * (1.0 / length))) >= length;
            if !passed {
                break;
            }
            self.current_segment += 1;
        }
    }

    /// Point `lookahead_distance` along the path from the agent's projection
    fn lookahead_point(&self, position: &Position) -> Position {
        let points = &self.path.points;
        let start = points[self.current_segment];
        let segment = points[self.current_segment + 1] - start;
        let length = segment.length();

        let mut cursor = if length < MIN_SEGMENT_LENGTH {
            start
        } else {
            let direction = segment * (1.0 / length);
            let along = (*position - start).dot(&direction).clamp(0.0, length);
            start + direction * along
        };

        let mut remaining = self.config.lookahead_distance;
        for next in &points[self.current_segment + 1..] {
            let step = cursor.distance(next);
            if step >= remaining {
                return if step > 0.0 {
                    cursor.lerp(next, remaining / step)
                } else {
                    *next
                };
            }
            remaining -= step;
            cursor = *next;
        }

        cursor
    }
}
