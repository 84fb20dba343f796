//! Deciding which listing records are new and persisting the outcome of a run.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::app::Result;
use crate::domain::{JobRecord, NewJob, StoredJob};
use crate::store::JobStore;

/// What the store already knows about a listed requisition.
#[derive(Debug, Clone)]
pub enum Sighting {
    Known(StoredJob),
    New,
}

/// Decisions staged during a run, applied together by [`Reconciler::commit`].
///
/// A requisition id is staged at most once; later duplicates in the same
/// listing are refused.
#[derive(Debug, Default)]
pub struct ReconcileBatch {
    touches: Vec<String>,
    inserts: Vec<NewJob>,
    staged: HashSet<String>,
}

impl ReconcileBatch {
    /// Stage a timestamp refresh for an existing job. Returns false if the
    /// id was already staged.
    pub fn touch(&mut self, requisition_id: impl Into<String>) -> bool {
        let requisition_id = requisition_id.into();
        if !self.staged.insert(requisition_id.clone()) {
            return false;
        }
        self.touches.push(requisition_id);
        true
    }

    /// Stage a new job. Returns false if its id was already staged.
    pub fn insert(&mut self, job: NewJob) -> bool {
        if !self.staged.insert(job.requisition_id().to_string()) {
            return false;
        }
        self.inserts.push(job);
        true
    }

    pub fn is_staged(&self, requisition_id: &str) -> bool {
        self.staged.contains(requisition_id)
    }

    pub fn touches(&self) -> &[String] {
        &self.touches
    }

    pub fn inserts(&self) -> &[NewJob] {
        &self.inserts
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }
}

pub struct Reconciler {
    store: Arc<dyn JobStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub fn classify(&self, record: &JobRecord) -> Result<Sighting> {
        Ok(match self.store.find_job(&record.requisition_id)? {
            Some(job) => Sighting::Known(job),
            None => Sighting::New,
        })
    }

    /// Apply the batch atomically, returning how many jobs were inserted.
    pub fn commit(&self, batch: &ReconcileBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let inserted = self.store.commit_batch(batch, Utc::now())?;
        tracing::info!(
            "Committed {} new jobs, refreshed {}",
            inserted,
            batch.touches().len()
        );
        Ok(inserted)
    }
}
