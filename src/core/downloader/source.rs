// ─── Remote Source ───
// Everything the launcher pulls from the network goes through this trait,
// so catalogs and downloads can be exercised without a network.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Body of a (possibly ranged) fetch.
pub struct RemoteBody {
    /// `true` when the server honoured the requested offset; otherwise the
    /// stream starts at byte zero and the caller must truncate.
    pub resumed: bool,
    pub content_length: Option<u64>,
    pub chunks: BoxStream<'static, LauncherResult<Vec<u8>>>,
}

#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_text(&self, url: &str) -> LauncherResult<String>;

    /// Fetch `url` starting at byte `offset` (0 for a full fetch).
    async fn fetch_from(&self, url: &str, offset: u64) -> LauncherResult<RemoteBody>;
}

/// reqwest-backed source used in production.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_with_retry(
        &self,
        url: &str,
        offset: u64,
    ) -> LauncherResult<reqwest::Response> {
        let mut retries = 0;
        loop {
            let mut request = self.client.get(url);
            if offset > 0 {
                request = request.header(RANGE, format!("bytes={offset}-"));
            }
            let response = request.send().await?;

            match response.status() {
                StatusCode::TOO_MANY_REQUESTS if retries < MAX_RATE_LIMIT_RETRIES => {
                    retries += 1;
                    let wait_time = Duration::from_secs(1 + retries as u64);
                    warn!(
                        "Rate limited by {url}, waiting {wait_time:?} before retry {retries}/{MAX_RATE_LIMIT_RETRIES}"
                    );
                    tokio::time::sleep(wait_time).await;
                }
                _ => return Ok(response),
            }
        }
    }
}

#[async_trait]
impl RemoteSource for HttpSource {
    async fn fetch_text(&self, url: &str) -> LauncherResult<String> {
        debug!("Fetching {}", url);
        let response = self.get_with_retry(url, 0).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn fetch_from(&self, url: &str, offset: u64) -> LauncherResult<RemoteBody> {
        let mut response = self.get_with_retry(url, offset).await?;

        // The partial file is already at least as long as the resource.
        if offset > 0 && response.status() == StatusCode::RANGE_NOT_SATISFIABLE {
            debug!("Range not satisfiable for {url}, refetching from zero");
            response = self.get_with_retry(url, 0).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        let content_length = response.content_length();
        let chunks = response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(LauncherError::from)
            .boxed();

        Ok(RemoteBody {
            resumed,
            content_length,
            chunks,
        })
    }
}
