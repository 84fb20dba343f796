use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{BlockPattern, EnableParams, SetBlockedUrLsParams};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::OnceCell;

use crate::app::{HarvestError, Result};
use crate::fetcher::{FetchConfig, Fetcher};

/// Sub-resources skipped while loading pages. Parsing only needs the DOM.
const BLOCKED_PATTERNS: [&str; 12] = [
    "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.svg", "*.ico", "*.css", "*.woff",
    "*.woff2", "*.ttf", "*.otf",
];

/// Headless Chrome fetcher using chromiumoxide.
///
/// The browser is launched on the first fetch and reused afterwards; every
/// fetch gets its own tab.
pub struct BrowserFetcher {
    config: FetchConfig,
    browser: OnceCell<Browser>,
}

impl BrowserFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            browser: OnceCell::new(),
        }
    }

    async fn browser(&self) -> Result<&Browser> {
        self.browser
            .get_or_try_init(|| launch(&self.config))
            .await
    }

    /// Apply client identity and resource blocking to a fresh tab.
    async fn prepare(&self, page: &Page) -> Result<()> {
        page.set_user_agent(self.config.user_agent.as_str())
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to set user agent: {}", e)))?;

        page.execute(SetLocaleOverrideParams {
            locale: Some(self.config.locale.clone()),
        })
        .await
        .map_err(|e| HarvestError::Browser(format!("Failed to set locale: {}", e)))?;

        page.execute(SetTimezoneOverrideParams::new(self.config.timezone.clone()))
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to set timezone: {}", e)))?;

        if self.config.block_resources {
            page.execute(EnableParams::default())
                .await
                .map_err(|e| HarvestError::Browser(format!("Failed to enable network: {}", e)))?;
            let patterns = BLOCKED_PATTERNS.iter().map(|p| BlockPattern::new(*p, true));
            page.execute(SetBlockedUrLsParams::builder().url_patterns(patterns).build())
                .await
                .map_err(|e| HarvestError::Browser(format!("Failed to block resources: {}", e)))?;
        }

        Ok(())
    }

    async fn load(&self, page: &Page, url: &str) -> Result<String> {
        self.prepare(page).await?;

        page.goto(url)
            .await
            .map_err(|e| HarvestError::Browser(format!("Navigation failed: {}", e)))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| HarvestError::Browser(format!("Navigation failed: {}", e)))?;

        // Let scripts finish materializing the DOM
        tokio::time::sleep(self.config.settle()).await;

        page.content()
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to read page content: {}", e)))
    }
}

async fn launch(config: &FetchConfig) -> Result<Browser> {
    let mut builder = BrowserConfig::builder()
        .arg("--no-sandbox")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-software-rasterizer")
        .arg("--no-first-run")
        .arg(format!("--lang={}", config.locale))
        .window_size(1920, 1080);

    if !config.headless {
        builder = builder.with_head();
    }

    let browser_config = builder
        .build()
        .map_err(|e| HarvestError::Browser(format!("Failed to build browser config: {}", e)))?;

    let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
        HarvestError::Browser(format!(
            "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
            e
        ))
    })?;

    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("Browser handler error: {}", e);
            }
        }
    });

    tracing::info!("Headless browser launched");
    Ok(browser)
}

#[async_trait]
impl Fetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let browser = self.browser().await?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| HarvestError::Browser(format!("Failed to create page: {}", e)))?;

        let result = tokio::time::timeout(self.config.timeout(), self.load(&page, url)).await;

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page: {}", e);
        }

        match result {
            Ok(content) => content,
            Err(_) => Err(HarvestError::Browser(format!(
                "Timed out after {}s loading {}",
                self.config.timeout_secs, url
            ))),
        }
    }
}
