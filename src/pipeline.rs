//! One full ingestion pass: listing, details for new postings, commit.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::Result;
use crate::domain::{JobDetails, NewJob};
use crate::fetcher::Fetcher;
use crate::guard::ChallengeGuard;
use crate::parser::{extract_details, parse_listing};
use crate::reconcile::{ReconcileBatch, Reconciler, Sighting};
use crate::store::JobStore;

/// Where the job board lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL that relative detail links are resolved against
    pub base_url: String,

    /// Search-results page listing every open posting
    pub listing_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.azstatejobs.gov".to_string(),
            listing_url: "https://www.azstatejobs.gov/jobs/search".to_string(),
        }
    }
}

/// Pacing of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause after each detail-page fetch, in milliseconds (default: 1000)
    pub request_delay_ms: u64,

    /// Wait before reloading a bot-challenge page, in milliseconds
    /// (default: 5000)
    pub challenge_retry_delay_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 1000,
            challenge_retry_delay_ms: 5000,
        }
    }
}

impl PipelineConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn challenge_retry_delay(&self) -> Duration {
        Duration::from_millis(self.challenge_retry_delay_ms)
    }
}

/// Outcome of a single run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Records parsed from the listing
    pub listed: usize,
    /// Listing rows that could not be parsed
    pub skipped_rows: usize,
    /// Jobs inserted this run
    pub new_records: usize,
    /// Existing jobs whose `updated_at` was refreshed
    pub touched: usize,
    /// Records repeated within the same listing
    pub duplicates: usize,
    /// Records skipped because the store lookup failed
    pub failed: usize,
}

/// Drives the fetch, parse, reconcile sequence against one site.
pub struct Harvester {
    fetcher: Arc<dyn Fetcher>,
    reconciler: Reconciler,
    guard: ChallengeGuard,
    listing_url: String,
    base_url: Url,
    request_delay: Duration,
}

impl Harvester {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<dyn Fetcher>,
        site: &SiteConfig,
        pipeline: &PipelineConfig,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            reconciler: Reconciler::new(store),
            guard: ChallengeGuard::new(pipeline.challenge_retry_delay()),
            listing_url: site.listing_url.clone(),
            base_url: Url::parse(&site.base_url)?,
            request_delay: pipeline.request_delay(),
        })
    }

    /// Run one ingestion pass.
    ///
    /// An unreachable listing page or a page without a results table yields
    /// an empty report. Only a failed commit is returned as `Err`, in which
    /// case nothing from this run was stored.
    pub async fn run_once(&self) -> Result<RunReport> {
        tracing::info!("Starting harvest of {}", self.listing_url);
        let mut report = RunReport::default();

        let html = match self.guard.fetch(self.fetcher.as_ref(), &self.listing_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to fetch listing {}: {}", self.listing_url, e);
                return Ok(report);
            }
        };

        let listing = parse_listing(&html, &self.base_url);
        report.listed = listing.records.len();
        report.skipped_rows = listing.skipped_rows;
        if !listing.table_found {
            return Ok(report);
        }

        let mut batch = ReconcileBatch::default();
        for record in listing.records {
            if batch.is_staged(&record.requisition_id) {
                tracing::debug!("Duplicate listing entry {}", record.requisition_id);
                report.duplicates += 1;
                continue;
            }

            match self.reconciler.classify(&record) {
                Ok(Sighting::Known(_)) => {
                    tracing::debug!("Already stored: {}", record.requisition_id);
                    batch.touch(record.requisition_id);
                }
                Ok(Sighting::New) => {
                    let details = self.fetch_details(&record.url).await;
                    batch.insert(NewJob::new(record, details));
                    tokio::time::sleep(self.request_delay).await;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: lookup failed: {}", record.requisition_id, e);
                    report.failed += 1;
                }
            }
        }

        report.touched = batch.touches().len();
        report.new_records = self.reconciler.commit(&batch).map_err(|e| {
            tracing::error!("Failed to commit harvest: {}", e);
            e
        })?;

        tracing::info!(
            "Harvest complete: {} listed, {} new, {} refreshed",
            report.listed,
            report.new_records,
            report.touched
        );
        Ok(report)
    }

    /// Details for a posting. A failed fetch leaves every field empty.
    async fn fetch_details(&self, url: &str) -> JobDetails {
        match self.guard.fetch(self.fetcher.as_ref(), url).await {
            Ok(html) => extract_details(&html),
            Err(e) => {
                tracing::warn!("Failed to fetch details {}: {}", url, e);
                JobDetails::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::app::HarvestError;
    use crate::store::{JobFilter, Page, SqliteStore};

    const LISTING_URL: &str = "https://jobs.example.com/jobs/search";

    /// Serves fixed pages by URL and records every request.
    #[derive(Default)]
    struct FakeSite {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeSite {
        fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
            self.pages.insert(url.to_string(), html.into());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for FakeSite {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| HarvestError::Other(format!("404 {url}")))
        }
    }

    fn row(req: &str) -> String {
        format!(
            "<tr><td><a href=\"/jobs/{req}\">Job {req}</a></td><td>{req}</td>\
             <td>General</td><td>Revenue</td><td>Full Time</td><td>Phoenix</td>\
             <td>Jan 5 2025</td><td>No</td></tr>"
        )
    }

    fn listing(reqs: &[&str]) -> String {
        let rows: String = reqs.iter().map(|r| row(r)).collect();
        format!("<html><body><table><tbody>{rows}</tbody></table></body></html>")
    }

    fn detail_url(req: &str) -> String {
        format!("https://jobs.example.com/jobs/{req}")
    }

    fn harvester(store: Arc<SqliteStore>, site: Arc<FakeSite>) -> Harvester {
        Harvester::new(
            store,
            site,
            &SiteConfig {
                base_url: "https://jobs.example.com".into(),
                listing_url: LISTING_URL.into(),
            },
            &PipelineConfig::default(),
        )
        .unwrap()
    }

    fn stored(store: &SqliteStore) -> usize {
        store
            .query_jobs(&JobFilter::default(), Page::default())
            .unwrap()
            .total
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_records_get_details() {
        let site = Arc::new(
            FakeSite::default()
                .with_page(LISTING_URL, listing(&["R1", "R2"]))
                .with_page(&detail_url("R1"), "<p>Salary: $40,000 - $50,000</p><p>Grade: 19</p>")
                .with_page(&detail_url("R2"), "<p>Nothing here</p>"),
        );
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = harvester(store.clone(), site.clone()).run_once().await.unwrap();

        assert_eq!(report.listed, 2);
        assert_eq!(report.new_records, 2);
        assert_eq!(report.touched, 0);

        let job = store.find_job("R1").unwrap().unwrap();
        assert_eq!(job.salary_text.as_deref(), Some("$40000 - $50000"));
        assert_eq!(job.salary_min, Some(40000.0));
        assert_eq!(job.salary_max, Some(50000.0));
        assert_eq!(job.grade.as_deref(), Some("19"));
        assert_eq!(job.url, detail_url("R1"));

        let job = store.find_job("R2").unwrap().unwrap();
        assert_eq!(job.salary_text, None);
        assert_eq!(job.grade, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_known_records_are_not_refetched() {
        let site = Arc::new(FakeSite::default().with_page(LISTING_URL, listing(&["R1"])));
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let harvester = harvester(store.clone(), site.clone());

        let first = harvester.run_once().await.unwrap();
        let second = harvester.run_once().await.unwrap();

        assert_eq!(first.new_records, 1);
        assert_eq!(second.new_records, 0);
        assert_eq!(second.touched, 1);
        assert_eq!(stored(&store), 1);

        let detail_requests = site
            .requests()
            .into_iter()
            .filter(|url| url == &detail_url("R1"))
            .count();
        assert_eq!(detail_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_detail_fetch_still_inserts_listing_fields() {
        let site = Arc::new(FakeSite::default().with_page(LISTING_URL, listing(&["R1"])));
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = harvester(store.clone(), site).run_once().await.unwrap();

        assert_eq!(report.new_records, 1);
        let job = store.find_job("R1").unwrap().unwrap();
        assert_eq!(job.title, "Job R1");
        assert_eq!(job.department.as_deref(), Some("Revenue"));
        assert!(job.job_summary.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_listing_is_an_empty_run() {
        let site = Arc::new(FakeSite::default());
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = harvester(store.clone(), site).run_once().await.unwrap();

        assert_eq!(report, RunReport::default());
        assert_eq!(stored(&store), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_without_table_is_an_empty_run() {
        let site = Arc::new(
            FakeSite::default().with_page(LISTING_URL, "<html><body>No results</body></html>"),
        );
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = harvester(store.clone(), site.clone()).run_once().await.unwrap();

        assert_eq!(report.new_records, 0);
        assert_eq!(site.requests(), vec![LISTING_URL.to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_listing_entry_is_stored_once() {
        let site = Arc::new(FakeSite::default().with_page(LISTING_URL, listing(&["R1", "R1"])));
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let report = harvester(store.clone(), site).run_once().await.unwrap();

        assert_eq!(report.new_records, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(stored(&store), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detail_fetches_are_throttled() {
        let site = Arc::new(FakeSite::default().with_page(LISTING_URL, listing(&["R1", "R2", "R3"])));
        let store = Arc::new(SqliteStore::in_memory().unwrap());

        let started = tokio::time::Instant::now();
        harvester(store, site).run_once().await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = Harvester::new(
            Arc::new(SqliteStore::in_memory().unwrap()),
            Arc::new(FakeSite::default()),
            &SiteConfig {
                base_url: "not a url".into(),
                listing_url: LISTING_URL.into(),
            },
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(HarvestError::InvalidUrl(_))));
    }
}
