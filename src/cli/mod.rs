pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::store::{JobFilter, Page};

#[derive(Parser)]
#[command(name = "jobharvest")]
#[command(about = "Harvests state job postings into a local database", long_about = None)]
pub struct Cli {
    /// Database file (default: <data dir>/jobharvest/jobharvest.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one harvest now and print how many new jobs were added
    Run,
    /// List stored jobs, newest first
    List(ListArgs),
    /// Print one stored job as JSON
    Show {
        /// Requisition id of the job
        requisition_id: String,
    },
    /// Scheduled background harvesting
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Match title, department or location
    #[arg(short, long)]
    pub search: Option<String>,

    /// Part of the title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Exact department name
    #[arg(short, long)]
    pub department: Option<String>,

    /// Part of the location
    #[arg(short, long)]
    pub location: Option<String>,

    /// Minimum of the salary range
    #[arg(long)]
    pub salary_min: Option<f64>,

    /// Maximum of the salary range
    #[arg(long)]
    pub salary_max: Option<f64>,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

impl ListArgs {
    pub fn filter(&self) -> JobFilter {
        JobFilter {
            search: self.search.clone(),
            title: self.title.clone(),
            department: self.department.clone(),
            location: self.location.clone(),
            salary_min: self.salary_min,
            salary_max: self.salary_max,
        }
    }

    pub fn page(&self) -> Page {
        Page {
            offset: self.offset,
            limit: self.limit,
        }
    }
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the scheduler in the foreground
    Start {
        /// Skip the harvest that normally runs at startup
        #[arg(long)]
        no_initial_run: bool,

        /// Log file path (default: stdout)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}
