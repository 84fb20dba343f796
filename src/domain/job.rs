use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::normalizer::parse_date;

/// A single row of the search-results listing, as parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub title: String,
    pub url: String,
    pub requisition_id: String,
    pub category: String,
    pub department: String,
    pub employment_type: String,
    pub location: String,
    pub closing_date: String,
    pub postsecondary_required: Option<String>,
}

/// Supplementary fields pulled from a job's detail page.
///
/// Every field is independent; extraction failures leave it `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    pub salary_text: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub grade: Option<String>,
    pub job_summary: Option<String>,
    pub job_duties: Option<String>,
    pub requirements: Option<String>,
}

impl JobDetails {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A fully assembled posting ready to be inserted into the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub record: JobRecord,
    pub details: JobDetails,
    pub closing_date: Option<NaiveDateTime>,
}

impl NewJob {
    pub fn new(record: JobRecord, details: JobDetails) -> Self {
        let closing_date = parse_date(&record.closing_date);
        Self {
            record,
            details,
            closing_date,
        }
    }

    pub fn requisition_id(&self) -> &str {
        &self.record.requisition_id
    }
}
