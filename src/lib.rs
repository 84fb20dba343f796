//! # jobharvest
//!
//! Periodically harvests job postings from a state job board into SQLite.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler → Fetcher → ChallengeGuard → Parser → Normalizer → Reconciler → Store
//! ```
//!
//! One run fetches the search-results listing, parses one record per row,
//! fetches the detail page for each record not yet stored, and commits every
//! insert and refresh in a single transaction.
//!
//! ## Quick Start
//!
//! ```bash
//! # Harvest once
//! jobharvest run
//!
//! # Browse what was stored
//! jobharvest list --department "Department of Revenue"
//! jobharvest show 123456
//!
//! # Harvest at 06:00, 10:00, 14:00 and 18:00 Phoenix time
//! jobharvest daemon start --log harvest.log
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together config, store,
/// fetcher and harvester.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/jobharvest/config.toml`.
pub mod config;

/// PID-file guarded daemon running the scheduler until signalled.
pub mod daemon;

/// Core domain models.
///
/// - [`JobRecord`](domain::JobRecord): one parsed listing row
/// - [`JobDetails`](domain::JobDetails): fields from a detail page
/// - [`StoredJob`](domain::StoredJob): a persisted posting
pub mod domain;

/// Page retrieval over HTTP or headless Chrome.
pub mod fetcher;

/// Bot-challenge detection with a single delayed reload.
pub mod guard;

/// Date and salary normalization.
pub mod normalizer;

/// Listing and detail page parsing.
pub mod parser;

/// One ingestion run end to end.
pub mod pipeline;

/// Insert-or-touch decisions and their atomic commit.
pub mod reconcile;

/// Fixed wall-clock schedule with at most one run in flight.
pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`JobStore`](store::JobStore): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
