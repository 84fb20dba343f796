pub mod browser;
pub mod config;
pub mod http_fetcher;

use std::sync::Arc;

use async_trait::async_trait;

use crate::app::Result;

pub use browser::BrowserFetcher;
pub use config::{FetchBackend, FetchConfig};
pub use http_fetcher::HttpFetcher;

/// Retrieves the raw HTML of a page.
///
/// `Err` means "no content this cycle" to callers; it is never fatal to a
/// whole ingestion run.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Load the same URL again, e.g. after a bot challenge.
    async fn reload(&self, url: &str) -> Result<String> {
        self.fetch(url).await
    }
}

/// Build the backend selected in `config`.
pub fn build(config: &FetchConfig) -> Result<Arc<dyn Fetcher>> {
    let fetcher: Arc<dyn Fetcher> = match config.backend {
        FetchBackend::Http => Arc::new(HttpFetcher::new(config)?),
        FetchBackend::Browser => Arc::new(BrowserFetcher::new(config.clone())),
    };
    Ok(fetcher)
}
