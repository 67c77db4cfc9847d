use anyhow::{ensure, Result};
use clap::Parser;
use log::info;

use road_pursuit::simulation::{DriverKind, SimWorld};

#[derive(Parser)]
#[command(name = "road_pursuit")]
#[command(about = "Headless road-network pursuit simulation")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "600")]
    ticks: u32,

    /// Time delta per tick in seconds
    #[arg(long, default_value = "0.05")]
    delta: f32,

    /// Number of path-following agents
    #[arg(long, default_value = "8")]
    agents: usize,

    /// Number of direct-pursuit agents
    #[arg(long, default_value = "0")]
    direct_agents: usize,

    /// Intersections per side of the generated grid city
    #[arg(long, default_value = "6")]
    grid_size: usize,

    /// Distance between neighbouring intersections
    #[arg(long, default_value = "20.0")]
    spacing: f32,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Cruise speed agents aim for
    #[arg(long, default_value = "20.0")]
    target_speed: f32,

    /// Seconds between path requests per agent
    #[arg(long, default_value = "1.0")]
    replan_interval: f32,

    /// Run without a pursuit target so agents patrol
    #[arg(long)]
    no_target: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,road_pursuit=info"),
    )
    .init();

    let cli = Cli::parse();
    ensure!(cli.delta > 0.0, "--delta must be positive");
    ensure!(cli.grid_size > 0, "--grid-size must be at least 1");
    ensure!(cli.replan_interval > 0.0, "--replan-interval must be positive");

    run_headless(&cli)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(cli: &Cli) -> Result<()> {
    info!("Running pursuit simulation in headless mode...");
    info!("Ticks: {}, Delta: {}s", cli.ticks, cli.delta);

    let mut world = SimWorld::create_test_world(cli.grid_size, cli.spacing, cli.seed);
    world.controller_config.target_speed = cli.target_speed;
    world.controller_config.replan_interval = cli.replan_interval;
    if cli.no_target {
        world.target = None;
    }

    for _ in 0..cli.agents {
        world.spawn_agent_at_random_node(DriverKind::PathFollowing)?;
    }
    for _ in 0..cli.direct_agents {
        world.spawn_agent_at_random_node(DriverKind::Direct)?;
    }

    info!("Initial state:");
    world.print_summary();

    // Report roughly once per simulated second
    let ticks_per_second = (1.0 / cli.delta).ceil().max(1.0) as u32;
    for tick in 1..=cli.ticks {
        world.tick(cli.delta);
        if tick % ticks_per_second == 0 {
            info!(
                "--- After tick {} ({:.1}s simulated time) ---",
                tick,
                tick as f32 * cli.delta
            );
            world.print_summary();
        }
    }

    info!("=== SIMULATION COMPLETE ===");
    world.print_summary();
    Ok(())
}
