use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which [`Fetcher`](crate::fetcher::Fetcher) implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchBackend {
    /// Plain HTTP client (reqwest)
    #[default]
    Http,
    /// Headless Chrome (chromiumoxide)
    Browser,
}

/// Configuration shared by both fetch backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Backend used to retrieve pages (default: http)
    pub backend: FetchBackend,

    /// User agent presented to the site
    pub user_agent: String,

    /// Locale presented to the site, e.g. "en-US"
    pub locale: String,

    /// IANA timezone the browser backend emulates
    pub timezone: String,

    /// Connection timeout in seconds (default: 10)
    pub connect_timeout_secs: u64,

    /// Whole-request / page-load timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Wait after DOM content loads before reading the page, in milliseconds
    /// (browser backend only, default: 3000)
    pub settle_ms: u64,

    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,

    /// Whether the browser skips images, stylesheets and fonts (default: true)
    pub block_resources: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            backend: FetchBackend::Http,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            locale: "en-US".to_string(),
            timezone: "America/Phoenix".to_string(),
            connect_timeout_secs: 10,
            timeout_secs: 30,
            settle_ms: 3000,
            headless: true,
            block_resources: true,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// `Accept-Language` value derived from the locale, e.g.
    /// `en-US,en;q=0.9`.
    pub fn accept_language(&self) -> String {
        match self.locale.split_once('-') {
            Some((lang, _)) => format!("{},{};q=0.9", self.locale, lang),
            None => self.locale.clone(),
        }
    }
}
