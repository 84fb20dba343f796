use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A posting as persisted in the `jobs` table.
///
/// `requisition_id` is the identity key. Temporal fields serialize as
/// ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredJob {
    pub id: i64,
    pub requisition_id: String,
    pub title: String,
    pub url: String,
    pub category: Option<String>,
    pub department: Option<String>,
    pub employment_type: Option<String>,
    pub location: Option<String>,
    pub closing_date_text: Option<String>,
    pub closing_date: Option<NaiveDateTime>,
    pub postsecondary_required: Option<String>,
    pub salary_text: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub grade: Option<String>,
    pub job_summary: Option<String>,
    pub job_duties: Option<String>,
    pub requirements: Option<String>,
    pub scraped_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredJob {
    /// Salary as shown to users: the parsed range when both bounds exist,
    /// otherwise whatever raw text was captured.
    pub fn display_salary(&self) -> String {
        match (self.salary_min, self.salary_max) {
            (Some(min), Some(max)) => format!("${:.2} - ${:.2}", min, max),
            _ => self.salary_text.clone().unwrap_or_default(),
        }
    }

    pub fn display_closing_date(&self) -> String {
        self.closing_date
            .map(|d| d.format("%b %d, %Y").to_string())
            .or_else(|| self.closing_date_text.clone())
            .unwrap_or_default()
    }
}
