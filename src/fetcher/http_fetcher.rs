use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::Client;

use crate::app::{HarvestError, Result};
use crate::fetcher::{FetchConfig, Fetcher};

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
        );
        let language = HeaderValue::from_str(&config.accept_language())
            .map_err(|e| HarvestError::Config(format!("Invalid locale: {}", e)))?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body_and_sends_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/search"))
            .and(header("accept-language", "en-US,en;q=0.9"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<table></table>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let body = fetcher
            .fetch(&format!("{}/jobs/search", server.uri()))
            .await
            .unwrap();

        assert_eq!(body, "<table></table>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let result = fetcher.fetch(&format!("{}/jobs/search", server.uri())).await;

        assert!(matches!(result, Err(HarvestError::Http(_))));
    }

    #[tokio::test]
    async fn test_reload_fetches_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let url = format!("{}/page", server.uri());
        fetcher.fetch(&url).await.unwrap();
        assert_eq!(fetcher.reload(&url).await.unwrap(), "ok");
    }
}
