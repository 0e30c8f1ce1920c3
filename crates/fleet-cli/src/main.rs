use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use fleet_core::models::{FleetLayout, UnitHealth};
use fleet_core::services::config_loader;
use fleet_core::services::fleet_manager::{BatchOutcome, FleetManager};
use fleet_core::services::runtime::ComposeCli;
use fleet_core::services::transfer::{self, Strategy};

#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Run isolated copies of the full application stack side by side")]
struct Cli {
    /// Write a debug trace log to .fleet-debug.log
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start fresh instances
    Start {
        /// Number of instances to start
        #[arg(long, default_value_t = 1)]
        instances: u32,
        /// Start this specific instance id instead
        #[arg(long, conflicts_with = "instances")]
        id: Option<u32>,
    },
    /// Stop one instance or the whole fleet
    Stop {
        /// Instance id to stop
        #[arg(long, conflicts_with = "all")]
        instance: Option<u32>,
        /// Stop every known instance
        #[arg(long)]
        all: bool,
    },
    /// Show ports, paths and live-unit state for every instance
    Status,
    /// Stop one instance and start it again under the same id
    Restart {
        /// Instance id to restart
        #[arg(long)]
        instance: u32,
    },
    /// Spread input files across the instances' inputs directories
    Distribute {
        /// Directory holding the files to distribute
        #[arg(long)]
        from: PathBuf,
        /// Distribution strategy
        #[arg(long, value_enum, default_value_t = StrategyArg::RoundRobin)]
        strategy: StrategyArg,
    },
    /// Gather the instances' outputs files into one directory
    Collect {
        /// Destination directory
        #[arg(long)]
        into: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    RoundRobin,
    Balanced,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::RoundRobin => Strategy::RoundRobin,
            StrategyArg::Balanced => Strategy::Balanced,
        }
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let _guard = cli.debug.then(setup_debug_logging);

    let layout = FleetLayout::new(std::env::current_dir()?);
    let config = config_loader::load_or_default(&layout.config_file())?;
    let manager = FleetManager::new(layout, config, ComposeCli);

    let ok = match cli.command {
        Commands::Start { id: Some(id), .. } => cmd_start_one(&manager, id).await,
        Commands::Start { instances, .. } => cmd_start_many(&manager, instances).await,
        Commands::Stop { all: true, .. } => cmd_stop_all(&manager).await,
        Commands::Stop {
            instance: Some(id), ..
        } => cmd_stop_one(&manager, id).await,
        Commands::Stop { .. } => {
            eprintln!("specify --instance ID or --all");
            false
        }
        Commands::Status => cmd_status(&manager).await,
        Commands::Restart { instance } => cmd_restart(&manager, instance).await,
        Commands::Distribute { from, strategy } => {
            cmd_distribute(&manager, &from, strategy.into()).await
        }
        Commands::Collect { into } => cmd_collect(&manager, &into).await,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Configure file-based tracing to `.fleet-debug.log` in CWD. Returns the
/// guard that must be held alive for the duration of the program.
fn setup_debug_logging() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(".", ".fleet-debug.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .init();

    guard
}

async fn cmd_start_one(manager: &FleetManager<ComposeCli>, id: u32) -> bool {
    match manager.start_instance(Some(id)).await {
        Ok(instance) => {
            println!("✓ instance {} started", instance.id);
            println!("  app:   http://localhost:{}", instance.app_port);
            println!("  cache: localhost:{}", instance.cache_port);
            println!("  data:  {}", instance.data_dir.display());
            true
        }
        Err(e) => {
            eprintln!("✗ failed to start instance {id}: {e}");
            false
        }
    }
}

async fn cmd_start_many(manager: &FleetManager<ComposeCli>, count: u32) -> bool {
    match manager.start_many(count).await {
        Ok(outcomes) => {
            report_batch(&outcomes, "started");
            let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
            println!("{succeeded}/{count} instance(s) started");
            succeeded > 0 || count == 0
        }
        Err(e) => {
            eprintln!("✗ {e}");
            false
        }
    }
}

async fn cmd_stop_one(manager: &FleetManager<ComposeCli>, id: u32) -> bool {
    match manager.stop_instance(id).await {
        Ok(instance) => {
            println!("✓ instance {id} stopped");
            println!("  data preserved at {}", instance.data_dir.display());
            true
        }
        Err(e) => {
            eprintln!("✗ failed to stop instance {id}: {e}");
            false
        }
    }
}

async fn cmd_stop_all(manager: &FleetManager<ComposeCli>) -> bool {
    match manager.stop_all().await {
        Ok(outcomes) => {
            if outcomes.is_empty() {
                println!("no instances running");
                return true;
            }
            report_batch(&outcomes, "stopped");
            let succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
            println!("{succeeded}/{} instance(s) stopped", outcomes.len());
            succeeded > 0
        }
        Err(e) => {
            eprintln!("✗ {e}");
            false
        }
    }
}

async fn cmd_restart(manager: &FleetManager<ComposeCli>, id: u32) -> bool {
    match manager.restart_instance(id).await {
        Ok(instance) => {
            println!("✓ instance {id} restarted");
            println!("  app:   http://localhost:{}", instance.app_port);
            println!("  cache: localhost:{}", instance.cache_port);
            true
        }
        Err(e) => {
            eprintln!("✗ failed to restart instance {id}: {e}");
            false
        }
    }
}

async fn cmd_status(manager: &FleetManager<ComposeCli>) -> bool {
    match manager.status().await {
        Ok(report) => {
            if report.is_empty() {
                println!("no instances running");
                return true;
            }
            for status in &report {
                let instance = &status.instance;
                println!("instance {}", instance.id);
                println!("  app:     http://localhost:{}", instance.app_port);
                println!("  cache:   localhost:{}", instance.cache_port);
                println!("  data:    {}", instance.data_dir.display());
                println!(
                    "  started: {}",
                    instance.started_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
                match status.units {
                    UnitHealth::Counted { running, expected } => {
                        println!("  units:   {running}/{expected} running");
                    }
                    UnitHealth::Unknown => println!("  units:   unknown"),
                }
            }
            true
        }
        Err(e) => {
            eprintln!("✗ {e}");
            false
        }
    }
}

async fn cmd_distribute(
    manager: &FleetManager<ComposeCli>,
    from: &Path,
    strategy: Strategy,
) -> bool {
    let fleet = match manager.fleet().await {
        Ok(fleet) => fleet,
        Err(e) => {
            eprintln!("✗ {e}");
            return false;
        }
    };
    match transfer::distribute(&fleet, from, strategy).await {
        Ok(report) => {
            for (id, count) in &report.per_instance {
                println!("instance {id}: {count} file(s)");
            }
            println!("✓ {} file(s) distributed", report.total());
            true
        }
        Err(e) => {
            eprintln!("✗ {e}");
            false
        }
    }
}

async fn cmd_collect(manager: &FleetManager<ComposeCli>, into: &Path) -> bool {
    let fleet = match manager.fleet().await {
        Ok(fleet) => fleet,
        Err(e) => {
            eprintln!("✗ {e}");
            return false;
        }
    };
    match transfer::collect(&fleet, into).await {
        Ok(report) => {
            for (id, count) in &report.per_instance {
                println!("instance {id}: {count} file(s)");
            }
            println!("✓ {} file(s) collected into {}", report.total(), into.display());
            true
        }
        Err(e) => {
            eprintln!("✗ {e}");
            false
        }
    }
}

fn report_batch(outcomes: &[BatchOutcome], verb: &str) {
    for outcome in outcomes {
        match &outcome.result {
            Ok(()) => println!("✓ instance {} {verb}", outcome.id),
            Err(e) => eprintln!("✗ instance {}: {e}", outcome.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn start_defaults_to_one_instance() {
        let cli = Cli::try_parse_from(["fleet", "start"]).unwrap();
        match cli.command {
            Commands::Start { instances, id } => {
                assert_eq!(instances, 1);
                assert!(id.is_none());
            }
            _ => panic!("expected start"),
        }
    }

    #[test]
    fn start_rejects_count_with_explicit_id() {
        assert!(Cli::try_parse_from(["fleet", "start", "--instances", "3", "--id", "2"]).is_err());
    }

    #[test]
    fn stop_rejects_instance_with_all() {
        assert!(Cli::try_parse_from(["fleet", "stop", "--instance", "1", "--all"]).is_err());
    }

    #[test]
    fn restart_requires_an_instance() {
        assert!(Cli::try_parse_from(["fleet", "restart"]).is_err());
        let cli = Cli::try_parse_from(["fleet", "restart", "--instance", "2"]).unwrap();
        assert!(matches!(cli.command, Commands::Restart { instance: 2 }));
    }

    #[test]
    fn distribute_parses_strategy() {
        let cli =
            Cli::try_parse_from(["fleet", "distribute", "--from", "in", "--strategy", "balanced"])
                .unwrap();
        match cli.command {
            Commands::Distribute { strategy, .. } => {
                assert_eq!(Strategy::from(strategy), Strategy::Balanced);
            }
            _ => panic!("expected distribute"),
        }
    }
}
