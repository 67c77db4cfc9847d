//! Pursuit controller validation tests

use rand::RngCore;
use road_pursuit::simulation::{
    AgentState, ControllerConfig, DriveIntent, PathPlanner, Position, PursuitController,
    RecoveryState, SimPath, SimRoadNetwork,
};
use std::cell::{Cell, RefCell};

const DT: f32 = 0.05;

/// Planner that hands out a fixed answer and counts requests
struct FixedPlanner {
    path: Option<SimPath>,
    calls: Cell<usize>,
    goals: RefCell<Vec<Position>>,
}

impl FixedPlanner {
    fn new(path: Option<SimPath>) -> Self {
        Self {
            path,
            calls: Cell::new(0),
            goals: RefCell::new(Vec::new()),
        }
    }

    fn with_goals(path: Option<SimPath>, goals: Vec<Position>) -> Self {
        Self {
            path,
            calls: Cell::new(0),
            goals: RefCell::new(goals),
        }
    }
}

impl PathPlanner for FixedPlanner {
    fn find_path(&self, _start: &Position, _end: &Position) -> Option<SimPath> {
        self.calls.set(self.calls.get() + 1);
        self.path.clone()
    }

    fn random_goal(&self, _rng: &mut dyn RngCore) -> Option<Position> {
        let mut goals = self.goals.borrow_mut();
        if goals.is_empty() {
            None
        } else {
            Some(goals.remove(0))
        }
    }
}

fn facing_z(position: Position, speed: f32) -> AgentState {
    AgentState::new(position, Position::new(0.0, 0.0, 1.0), speed)
}

fn straight_path() -> SimPath {
    SimPath::new(vec![Position::new(0.0, 0.0, 0.0), Position::new(0.0, 0.0, 100.0)])
}

fn angled_path() -> SimPath {
    SimPath::new(vec![Position::new(0.0, 0.0, 0.0), Position::new(3.0, 0.0, 10.0)])
}

fn expected_steering(x: f32, z: f32, max_steer_angle: f32) -> f32 {
    (x.atan2(z).to_degrees() / max_steer_angle).clamp(-1.0, 1.0)
}

#[test]
fn test_no_path_is_idle() {
    let mut controller = PursuitController::new(ControllerConfig::default());
    let intent = controller.update(DT, &facing_z(Position::ZERO, 0.0));
    assert_eq!(intent, DriveIntent::IDLE);

    // A one-point path is never installed
    assert!(!controller.set_path(SimPath::new(vec![Position::ZERO])));
    assert_eq!(controller.update(DT, &facing_z(Position::ZERO, 0.0)), DriveIntent::IDLE);
}

#[test]
fn test_first_tick_full_throttle() {
    let config = ControllerConfig {
        target_speed: 20.0,
        ..ControllerConfig::default()
    };
    let max_steer = config.max_steer_angle;
    let mut controller = PursuitController::new(config);
    assert!(controller.set_path(angled_path()));

    let intent = controller.update(DT, &facing_z(Position::ZERO, 0.0));
    assert_eq!(intent.throttle, 1.0);
    assert!(!intent.brake);
    // Lookahead point lies on the path ray, so the angle is the ray's angle
    let expected = expected_steering(3.0, 10.0, max_steer);
    assert!(expected > 0.0);
    assert!((intent.steering - expected).abs() < 1e-3);
}

#[test]
fn test_steering_sign_follows_side() {
    let mut controller = PursuitController::new(ControllerConfig::default());
    controller.set_path(SimPath::new(vec![
        Position::ZERO,
        Position::new(-3.0, 0.0, 10.0),
    ]));
    let left = controller.update(DT, &facing_z(Position::ZERO, 0.0));
    assert!(left.steering < 0.0);

    controller.set_path(straight_path());
    let ahead = controller.update(DT, &facing_z(Position::ZERO, 0.0));
    assert!(ahead.steering.abs() < 1e-6);

    // Target directly behind saturates the steering
    let reversed = AgentState::new(Position::ZERO, Position::new(0.5, 0.0, -1.0), 0.0);
    let behind = controller.update(DT, &reversed);
    assert_eq!(behind.steering.abs(), 1.0);
}

#[test]
fn test_throttle_governor() {
    let mut controller = PursuitController::new(ControllerConfig {
        target_speed: 20.0,
        ..ControllerConfig::default()
    });
    controller.set_path(straight_path());

    let half = controller.update(DT, &facing_z(Position::ZERO, 10.0));
    assert!((half.throttle - 0.5).abs() < 1e-6);
    let at_speed = controller.update(DT, &facing_z(Position::ZERO, 20.0));
    assert_eq!(at_speed.throttle, 0.0);
    let too_fast = controller.update(DT, &facing_z(Position::ZERO, 35.0));
    assert_eq!(too_fast.throttle, 0.0);
}

#[test]
fn test_segment_index_advances_past_finished_segments() {
    let mut controller = PursuitController::new(ControllerConfig::default());
    controller.set_path(SimPath::new(vec![
        Position::new(0.0, 0.0, 0.0),
        Position::new(0.0, 0.0, 10.0),
        Position::new(0.0, 0.0, 20.0),
        Position::new(0.0, 0.0, 30.0),
    ]));

    controller.update(DT, &facing_z(Position::new(0.5, 0.0, 4.0), 0.0));
    assert_eq!(controller.current_segment(), 0);

    controller.update(DT, &facing_z(Position::new(0.5, 0.0, 15.0), 0.0));
    assert_eq!(controller.current_segment(), 1);

    // Past the end of the path: clamped to the final segment
    controller.update(DT, &facing_z(Position::new(0.0, 0.0, 45.0), 0.0));
    assert_eq!(controller.current_segment(), 2);
}

#[test]
fn test_lookahead_walks_across_segments() {
    let config = ControllerConfig {
        lookahead_distance: 6.0,
        ..ControllerConfig::default()
    };
    let max_steer = config.max_steer_angle;
    let mut controller = PursuitController::new(config);
    // Corner 2 units ahead, then a right turn
    controller.set_path(SimPath::new(vec![
        Position::new(0.0, 0.0, 0.0),
        Position::new(0.0, 0.0, 2.0),
        Position::new(20.0, 0.0, 2.0),
    ]));

    let intent = controller.update(DT, &facing_z(Position::ZERO, 0.0));
    // 2 units to the corner, 4 more along +x
    let expected = expected_steering(4.0, 2.0, max_steer);
    assert!((intent.steering - expected).abs() < 1e-3);
}

#[test]
fn test_lookahead_clamps_to_path_end() {
    let config = ControllerConfig {
        lookahead_distance: 6.0,
        ..ControllerConfig::default()
    };
    let max_steer = config.max_steer_angle;
    let mut controller = PursuitController::new(config);
    controller.set_path(SimPath::new(vec![
        Position::new(0.0, 0.0, 0.0),
        Position::new(0.0, 0.0, 2.0),
    ]));

    let intent = controller.update(DT, &facing_z(Position::new(1.0, 0.0, 0.0), 0.0));
    let expected = expected_steering(-1.0, 2.0, max_steer);
    assert!((intent.steering - expected).abs() < 1e-3);
}

#[test]
fn test_replan_fires_once_per_interval() {
    let planner = FixedPlanner::new(Some(straight_path()));
    let mut controller = PursuitController::new(ControllerConfig {
        replan_interval: 1.0,
        ..ControllerConfig::default()
    });
    let agent = facing_z(Position::ZERO, 0.0);
    let target = Some(Position::new(0.0, 0.0, 100.0));

    for _ in 0..9 {
        controller.tick(0.1, &agent, target, &planner);
    }
    assert_eq!(planner.calls.get(), 0);

    controller.tick(0.1, &agent, target, &planner);
    assert_eq!(planner.calls.get(), 1);
    assert_eq!(controller.path(), &straight_path());

    for _ in 0..9 {
        controller.tick(0.1, &agent, target, &planner);
    }
    assert_eq!(planner.calls.get(), 1);

    controller.tick(0.1, &agent, target, &planner);
    assert_eq!(planner.calls.get(), 2);
    assert_eq!(controller.replan_count(), 2);
}

#[test]
fn test_replan_single_whole_interval_step() {
    let planner = FixedPlanner::new(Some(straight_path()));
    let mut controller = PursuitController::new(ControllerConfig {
        replan_interval: 1.0,
        ..ControllerConfig::default()
    });

    controller.tick(1.0, &facing_z(Position::ZERO, 0.0), Some(Position::ZERO), &planner);
    assert_eq!(planner.calls.get(), 1);
}

#[test]
fn test_replan_schedule_carries_overshoot() {
    let planner = FixedPlanner::new(Some(straight_path()));
    let mut controller = PursuitController::new(ControllerConfig {
        replan_interval: 1.0,
        ..ControllerConfig::default()
    });
    let agent = facing_z(Position::ZERO, 0.0);
    let target = Some(Position::new(0.0, 0.0, 100.0));

    // 0.3 doesn't divide the interval; 20 ticks cover 6 seconds
    let mut fired_on = Vec::new();
    for tick in 1..=20 {
        let before = planner.calls.get();
        controller.tick(0.3, &agent, target, &planner);
        if planner.calls.get() > before {
            fired_on.push(tick);
        }
    }
    assert_eq!(fired_on, vec![4, 7, 10, 14, 17, 20]);
}

#[test]
fn test_failed_replan_keeps_cached_path() {
    let mut controller = PursuitController::new(ControllerConfig::default());
    controller.set_path(angled_path());
    let agent = facing_z(Position::ZERO, 0.0);

    let nothing = FixedPlanner::new(None);
    assert!(!controller.replan(&agent, Some(Position::new(50.0, 0.0, 0.0)), &nothing));
    assert_eq!(controller.path(), &angled_path());

    let degenerate = FixedPlanner::new(Some(SimPath::new(vec![Position::ZERO])));
    assert!(!controller.replan(&agent, Some(Position::new(50.0, 0.0, 0.0)), &degenerate));
    assert_eq!(controller.path(), &angled_path());

    let fresh = FixedPlanner::new(Some(straight_path()));
    assert!(controller.replan(&agent, Some(Position::new(0.0, 0.0, 100.0)), &fresh));
    assert_eq!(controller.path(), &straight_path());
    assert_eq!(controller.current_segment(), 0);
}

#[test]
fn test_patrol_goal_changes_only_when_reached() {
    let goal_a = Position::new(0.0, 0.0, 50.0);
    let goal_b = Position::new(40.0, 0.0, 0.0);
    let planner = FixedPlanner::with_goals(Some(straight_path()), vec![goal_a, goal_b]);
    let mut controller = PursuitController::new_with_seed(ControllerConfig::default(), 11);

    assert!(controller.replan(&facing_z(Position::ZERO, 0.0), None, &planner));
    assert_eq!(controller.patrol_goal(), Some(goal_a));

    // Still far away: same goal
    controller.replan(&facing_z(Position::new(0.0, 0.0, 20.0), 0.0), None, &planner);
    assert_eq!(controller.patrol_goal(), Some(goal_a));

    // Within the arrival radius: a new goal is drawn
    controller.replan(&facing_z(Position::new(0.0, 0.0, 49.0), 0.0), None, &planner);
    assert_eq!(controller.patrol_goal(), Some(goal_b));

    // A pursuit target takes over from patrolling
    controller.replan(&facing_z(Position::ZERO, 0.0), Some(goal_a), &planner);
    assert_eq!(controller.patrol_goal(), None);
}

#[test]
fn test_patrol_on_road_network_picks_a_node() {
    let mut network = SimRoadNetwork::new();
    let a = network.create_node(Position::new(0.0, 0.0, 0.0));
    let b = network.create_node(Position::new(0.0, 0.0, 30.0));
    network.create_two_way_lane(a, b, Vec::new(), 15.0);

    let mut controller = PursuitController::new_with_seed(ControllerConfig::default(), 5);
    controller.replan(&facing_z(Position::new(0.0, 0.0, 15.0), 0.0), None, &network);

    let goal = controller.patrol_goal().expect("patrol goal chosen");
    assert!(network.nodes().iter().any(|node| node.position == goal));
    assert_eq!(controller.replan_count(), 1);
}

#[test]
fn test_stuck_recovery_sequence() {
    let config = ControllerConfig {
        stuck_time_threshold: 2.0,
        reverse_duration: 1.25,
        forward_recover_duration: 0.75,
        ..ControllerConfig::default()
    };
    let reverse_throttle = config.reverse_throttle;
    let recover_throttle = config.forward_recover_throttle;
    let mut controller = PursuitController::new(config);
    controller.set_path(angled_path());
    let stuck = facing_z(Position::ZERO, 0.0);

    // Pushing at full throttle without moving for 1.95s: not yet
    let mut pursuit = DriveIntent::IDLE;
    for _ in 0..39 {
        pursuit = controller.update(DT, &stuck);
        assert!(pursuit.throttle > 0.5);
    }
    assert_eq!(controller.recovery_state(), RecoveryState::Normal);
    assert!((controller.stuck_time() - 1.95).abs() < 1e-3);

    // By 2.1s the reverse maneuver has started
    let mut ticks = 39;
    while controller.recovery_state().is_normal() {
        pursuit = controller.update(DT, &stuck);
        ticks += 1;
        assert!(ticks <= 42, "no recovery after {:.2}s", ticks as f32 * DT);
    }
    assert!(matches!(
        controller.recovery_state(),
        RecoveryState::Reversing { .. }
    ));
    assert_eq!(controller.stuck_time(), 0.0);
    assert_eq!(controller.recovery_count(), 1);

    // 1.25s of reversing, steering mirrored
    for _ in 0..24 {
        let intent = controller.update(DT, &stuck);
        assert_eq!(intent.throttle, reverse_throttle);
        assert_eq!(intent.steering, -pursuit.steering);
        assert!(!intent.brake);
        assert!(matches!(
            controller.recovery_state(),
            RecoveryState::Reversing { .. }
        ));
    }
    controller.update(DT, &stuck);
    assert!(matches!(
        controller.recovery_state(),
        RecoveryState::ForwardRecover { .. }
    ));

    // 0.75s of gentle forward with normal steering
    for _ in 0..14 {
        let intent = controller.update(DT, &stuck);
        assert_eq!(intent.throttle, recover_throttle);
        assert!((intent.steering - pursuit.steering).abs() < 1e-6);
        assert!(matches!(
            controller.recovery_state(),
            RecoveryState::ForwardRecover { .. }
        ));
    }
    controller.update(DT, &stuck);
    assert_eq!(controller.recovery_state(), RecoveryState::Normal);
}

#[test]
fn test_stuck_timer_resets_when_moving() {
    let mut controller = PursuitController::new(ControllerConfig::default());
    controller.set_path(straight_path());

    for _ in 0..30 {
        controller.update(DT, &facing_z(Position::ZERO, 0.0));
    }
    assert!(controller.stuck_time() > 1.0);

    // Moving: condition breaks and the timer restarts
    controller.update(DT, &facing_z(Position::ZERO, 1.0));
    assert_eq!(controller.stuck_time(), 0.0);

    for _ in 0..30 {
        controller.update(DT, &facing_z(Position::ZERO, 0.0));
    }
    // At target speed the throttle drops, which also clears it
    controller.update(DT, &facing_z(Position::ZERO, 25.0));
    assert_eq!(controller.stuck_time(), 0.0);
    assert_eq!(controller.recovery_state(), RecoveryState::Normal);
}

#[test]
fn test_replanning_continues_during_recovery() {
    let planner = FixedPlanner::new(Some(straight_path()));
    let mut controller = PursuitController::new(ControllerConfig::default());
    controller.set_path(straight_path());
    let stuck = facing_z(Position::ZERO, 0.0);
    let target = Some(Position::new(0.0, 0.0, 100.0));

    for _ in 0..50 {
        controller.tick(DT, &stuck, target, &planner);
    }
    assert!(!controller.recovery_state().is_normal());
    assert_eq!(planner.calls.get(), 2);
}
