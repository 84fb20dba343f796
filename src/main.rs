use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jobharvest::app::AppContext;
use jobharvest::cli::{commands, Cli, Commands, DaemonAction};
use jobharvest::config::Config;
use jobharvest::daemon::{self, Daemon, DaemonConfig};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobharvest=info"))
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter())
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(env_filter())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Daemon {
            action: DaemonAction::Start { log, .. },
        } => log.as_deref(),
        _ => None,
    };
    init_tracing(log_file)?;

    match cli.command {
        Commands::Daemon {
            action: DaemonAction::Stop,
        } => {
            daemon::stop_daemon()?;
            println!("Daemon stopped");
            return Ok(());
        }
        Commands::Daemon {
            action: DaemonAction::Status,
        } => {
            println!("{}", daemon::daemon_status());
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load()?;
    let ctx = AppContext::new(config, cli.db)?;

    match cli.command {
        Commands::Run => {
            commands::run_harvest(&ctx).await?;
        }
        Commands::List(args) => {
            commands::list_jobs(&ctx, &args)?;
        }
        Commands::Show { requisition_id } => {
            commands::show_job(&ctx, &requisition_id)?;
        }
        Commands::Daemon {
            action: DaemonAction::Start { no_initial_run, .. },
        } => {
            let config = DaemonConfig {
                run_on_start: !no_initial_run,
            };
            Daemon::new(&ctx, config)?.run().await?;
        }
        Commands::Daemon { .. } => {}
    }

    Ok(())
}
