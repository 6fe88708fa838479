use crate::model::{ScrapeRequest, ScraperError};
use crate::scraper::traits::Scraper;

use reqwest::Client;
use std::time::Duration;

pub struct ScraperImpl {
    client: Client,
}

impl ScraperImpl {
    /// Builds a client with a fixed per-request timeout. No retries are made.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Scraper for ScraperImpl {
    async fn fetch(&self, req: &ScrapeRequest) -> Result<String, ScraperError> {
        let response = self.client.get(&req.url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScraperError::Timeout
            } else {
                ScraperError::HttpError(e)
            }
        })?;

        if !response.status().is_success() {
            return Err(ScraperError::InvalidResponse(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }
}
