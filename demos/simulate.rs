use behavior_tree_sim::{Scheduler, SchedulerState, SimulatorConfig, SystemClock, Tree};
use std::fs;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let tree_file = args.next().unwrap_or_else(|| "demos/guard.yaml".to_string());
    let tree = Tree::from_yaml(&fs::read_to_string(&tree_file)?)?;
    let config = match args.next() {
        Some(config_file) => SimulatorConfig::from_yaml(&fs::read_to_string(config_file)?)?,
        None => SimulatorConfig {
            tick_period_ms: 200,
            ..SimulatorConfig::default()
        },
    };

    let mut scheduler = Scheduler::with_config(SystemClock::default(), &config);
    scheduler.subscribe(|event| {
        println!(
            "[{:>6} ms] {}",
            event.timestamp.as_millis(),
            event.message
        )
    });
    if !scheduler.start(tree) {
        anyhow::bail!("{} is not a runnable tree", tree_file);
    }
    scheduler.run_until_idle();
    while scheduler.state() == SchedulerState::Paused {
        println!("Paused at {:?}, resuming", scheduler.breakpoints().collect::<Vec<_>>());
        scheduler.resume();
        scheduler.run_until_idle();
    }

    for entry in scheduler.history() {
        println!(
            "{:>6} ms {} {} {}",
            entry.timestamp.as_millis(),
            entry.node_name,
            entry.result,
            serde_json::to_string(&entry.blackboard_snapshot)?
        );
    }
    println!("{}", serde_json::to_string_pretty(&scheduler.stats())?);
    Ok(())
}
