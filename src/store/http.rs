//! HTTP score source
//!
//! Drains the upstream `GET {base}/scores?offset=&limit=` endpoint page by
//! page. A failed page fails the whole fetch; a partial ranking is never
//! returned.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::ScoreSource;
use crate::types::{PodiumError, Result, ScoreRecord};

/// One page of upstream scores
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePage {
    pub items: Vec<ScoreRecord>,
    /// Offset of the next page; absent on the last page
    #[serde(default)]
    pub next_offset: Option<u64>,
}

/// Paginated score API client
pub struct HttpScoreSource {
    base_url: String,
    page_size: u32,
    max_pages: u32,
    http_client: reqwest::Client,
}

impl HttpScoreSource {
    pub fn new(base_url: &str, page_size: u32, max_pages: u32, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PodiumError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
            http_client,
        })
    }

    fn page_url(&self) -> String {
        format!("{}/scores", self.base_url)
    }

    async fn fetch_page(&self, offset: u64) -> Result<ScorePage> {
        let response = self
            .http_client
            .get(self.page_url())
            .query(&[("offset", offset), ("limit", self.page_size as u64)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PodiumError::UpstreamUnavailable(format!(
                "score source returned {} for offset {}",
                status, offset
            )));
        }

        response.json::<ScorePage>().await.map_err(|e| {
            PodiumError::UpstreamUnavailable(format!("malformed score page at offset {}: {}", offset, e))
        })
    }
}

#[async_trait::async_trait]
impl ScoreSource for HttpScoreSource {
    async fn fetch_scores(&self) -> Result<Vec<ScoreRecord>> {
        let mut records = Vec::new();
        let mut offset = 0u64;

        for page_no in 0..self.max_pages {
            let page = self.fetch_page(offset).await?;
            debug!(page = page_no, offset = offset, items = page.items.len(), "Fetched score page");
            records.extend(page.items);

            match next_offset(offset, page.next_offset) {
                Ok(Some(next)) => offset = next,
                Ok(None) => {
                    info!(pages = page_no + 1, records = records.len(), "Score source drained");
                    return Ok(records);
                }
                Err(e) => return Err(e),
            }
        }

        warn!(max_pages = self.max_pages, "Score pagination did not terminate");
        Err(PodiumError::UpstreamUnavailable(format!(
            "score source returned more than {} pages",
            self.max_pages
        )))
    }
}

/// Validate the cursor advance between two pages
fn next_offset(current: u64, next: Option<u64>) -> Result<Option<u64>> {
    match next {
        None => Ok(None),
        Some(next) if next > current => Ok(Some(next)),
        Some(next) => Err(PodiumError::UpstreamUnavailable(format!(
            "score source cursor did not advance ({} -> {})",
            current, next
        ))),
    }
}
