//! Detection of anti-automation interstitials and a single bounded retry.

use std::time::Duration;

use crate::app::Result;
use crate::fetcher::Fetcher;

/// Phrases that only appear on the site's bot-challenge pages.
pub const CHALLENGE_MARKERS: [&str; 2] = ["JavaScript is disabled", "verify that you're not a robot"];

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

pub fn is_challenge(content: &str) -> bool {
    CHALLENGE_MARKERS
        .iter()
        .any(|marker| content.contains(marker))
}

/// Wraps fetches with bot-challenge handling.
#[derive(Debug, Clone)]
pub struct ChallengeGuard {
    retry_delay: Duration,
}

impl Default for ChallengeGuard {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

impl ChallengeGuard {
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    /// Fetch `url`, reloading once after a delay if a challenge page comes
    /// back.
    ///
    /// Only the initial fetch can fail. If the reload fails or is still a
    /// challenge, the content seen so far is returned as-is; downstream
    /// parsing then finds nothing usable.
    pub async fn fetch(&self, fetcher: &dyn Fetcher, url: &str) -> Result<String> {
        let content = fetcher.fetch(url).await?;
        if !is_challenge(&content) {
            return Ok(content);
        }

        tracing::warn!(
            "Bot challenge detected at {}, retrying in {:?}",
            url,
            self.retry_delay
        );
        tokio::time::sleep(self.retry_delay).await;

        match fetcher.reload(url).await {
            Ok(reloaded) if !is_challenge(&reloaded) => {
                tracing::info!("Bot challenge cleared at {}", url);
                Ok(reloaded)
            }
            Ok(reloaded) => {
                tracing::warn!("Still hitting bot challenge at {}", url);
                Ok(reloaded)
            }
            Err(e) => {
                tracing::warn!("Reload after bot challenge failed at {}: {}", url, e);
                Ok(content)
            }
        }
    }
}
