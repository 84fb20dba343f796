use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{HarvestError, Result};
use crate::domain::StoredJob;
use crate::reconcile::ReconcileBatch;
use crate::store::{JobFilter, JobPage, JobStore, Page};

const JOB_COLUMNS: &str = "id, requisition_id, title, url, category, department, employment_type, \
     location, closing_date_text, closing_date, postsecondary_required, salary_text, salary_min, \
     salary_max, grade, job_summary, job_duties, requirements, scraped_at, updated_at";

const CLOSING_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations.to_latest(&mut conn)?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HarvestError::Other(format!("Store lock poisoned: {}", e)))
    }

    /// Timestamp column written by `commit_batch`; anything else is corrupt.
    fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
        let text: String = row.get(idx)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn row_to_job(row: &Row<'_>) -> rusqlite::Result<StoredJob> {
        Ok(StoredJob {
            id: row.get(0)?,
            requisition_id: row.get(1)?,
            title: row.get(2)?,
            url: row.get(3)?,
            category: row.get(4)?,
            department: row.get(5)?,
            employment_type: row.get(6)?,
            location: row.get(7)?,
            closing_date_text: row.get(8)?,
            closing_date: row
                .get::<_, Option<String>>(9)?
                .and_then(|s| NaiveDateTime::parse_from_str(&s, CLOSING_DATE_FORMAT).ok()),
            postsecondary_required: row.get(10)?,
            salary_text: row.get(11)?,
            salary_min: row.get(12)?,
            salary_max: row.get(13)?,
            grade: row.get(14)?,
            job_summary: row.get(15)?,
            job_duties: row.get(16)?,
            requirements: row.get(17)?,
            scraped_at: Self::timestamp(row, 18)?,
            updated_at: Self::timestamp(row, 19)?,
        })
    }

    fn distinct_column(&self, column: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM jobs
             WHERE {column} IS NOT NULL AND {column} != ''
             ORDER BY {column}"
        ))?;
        let values = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(values)
    }

    #[cfg(test)]
    pub(crate) fn execute_sql(&self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }
}

/// `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// WHERE clause and bound values for a filter.
fn filter_clause(filter: &JobFilter) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        conditions.push(
            "(title LIKE ? ESCAPE '\\' OR department LIKE ? ESCAPE '\\' OR location LIKE ? ESCAPE '\\')",
        );
        let pattern = contains_pattern(search);
        for _ in 0..3 {
            values.push(Value::Text(pattern.clone()));
        }
    }
    if let Some(title) = filter.title.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("title LIKE ? ESCAPE '\\'");
        values.push(Value::Text(contains_pattern(title)));
    }
    if let Some(department) = filter.department.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("department = ?");
        values.push(Value::Text(department.to_string()));
    }
    if let Some(location) = filter.location.as_deref().filter(|s| !s.is_empty()) {
        conditions.push("location LIKE ? ESCAPE '\\'");
        values.push(Value::Text(contains_pattern(location)));
    }
    if let Some(min) = filter.salary_min {
        conditions.push("salary_min >= ?");
        values.push(Value::Real(min));
    }
    if let Some(max) = filter.salary_max {
        conditions.push("salary_max <= ?");
        values.push(Value::Real(max));
    }

    if conditions.is_empty() {
        (String::new(), values)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), values)
    }
}

impl JobStore for SqliteStore {
    fn find_job(&self, requisition_id: &str) -> Result<Option<StoredJob>> {
        let conn = self.conn()?;
        let result = conn
            .query_row(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE requisition_id = ?1"),
                params![requisition_id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(result)
    }

    fn commit_batch(&self, batch: &ReconcileBatch, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now.to_rfc3339();

        for requisition_id in batch.touches() {
            tx.execute(
                "UPDATE jobs SET updated_at = ?1 WHERE requisition_id = ?2",
                params![now, requisition_id],
            )?;
        }

        let mut inserted = 0;
        for job in batch.inserts() {
            let record = &job.record;
            let details = &job.details;
            inserted += tx.execute(
                "INSERT INTO jobs (requisition_id, title, url, category, department, employment_type,
                     location, closing_date_text, closing_date, postsecondary_required, salary_text,
                     salary_min, salary_max, grade, job_summary, job_duties, requirements,
                     scraped_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?18)",
                params![
                    record.requisition_id,
                    record.title,
                    record.url,
                    record.category,
                    record.department,
                    record.employment_type,
                    record.location,
                    record.closing_date,
                    job.closing_date
                        .map(|d| d.format(CLOSING_DATE_FORMAT).to_string()),
                    record.postsecondary_required,
                    details.salary_text,
                    details.salary_min,
                    details.salary_max,
                    details.grade,
                    details.job_summary,
                    details.job_duties,
                    details.requirements,
                    now
                ],
            )?;
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;
        Ok(inserted)
    }

    fn query_jobs(&self, filter: &JobFilter, page: Page) -> Result<JobPage> {
        let (clause, mut values) = filter_clause(filter);
        let conn = self.conn()?;

        let total: i64 = conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?;
        let filtered: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM jobs {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(page.limit as i64));
        values.push(Value::Integer(page.offset as i64));

        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs {clause}
             ORDER BY scraped_at DESC, id DESC LIMIT ? OFFSET ?"
        ))?;
        let jobs = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_job)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(JobPage {
            jobs,
            total: total as usize,
            filtered: filtered as usize,
        })
    }

    fn distinct_departments(&self) -> Result<Vec<String>> {
        self.distinct_column("department")
    }

    fn distinct_locations(&self) -> Result<Vec<String>> {
        self.distinct_column("location")
    }
}
