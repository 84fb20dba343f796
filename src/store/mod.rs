pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::StoredJob;
use crate::reconcile::ReconcileBatch;

pub use sqlite::SqliteStore;

/// Filter predicates over stored jobs. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Substring of title, department or location
    pub search: Option<String>,
    /// Substring of title
    pub title: Option<String>,
    /// Exact department
    pub department: Option<String>,
    /// Substring of location
    pub location: Option<String>,
    /// Lower bound on `salary_min`
    pub salary_min: Option<f64>,
    /// Upper bound on `salary_max`
    pub salary_max: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 10,
        }
    }
}

/// One page of jobs, newest first, with counts for pagination.
#[derive(Debug, Clone)]
pub struct JobPage {
    pub jobs: Vec<StoredJob>,
    /// Jobs in the store
    pub total: usize,
    /// Jobs matching the filter
    pub filtered: usize,
}

pub trait JobStore: Send + Sync {
    // Reconciliation
    fn find_job(&self, requisition_id: &str) -> Result<Option<StoredJob>>;
    /// Apply every staged decision in one transaction and return the number
    /// of inserted rows. On error nothing from the batch is kept.
    fn commit_batch(&self, batch: &ReconcileBatch, now: DateTime<Utc>) -> Result<usize>;

    // Read surface
    fn query_jobs(&self, filter: &JobFilter, page: Page) -> Result<JobPage>;
    fn distinct_departments(&self) -> Result<Vec<String>>;
    fn distinct_locations(&self) -> Result<Vec<String>>;
}
