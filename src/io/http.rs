use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use std::time::Duration;
use tracing::{debug, warn};

use super::{Progress, RangeFetch, StreamOptions};
use crate::error::{Error, Result};

/// Settings for the HTTP client behind [`HttpRangeFetcher`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Range fetcher for remote archives served over HTTP
pub struct HttpRangeFetcher {
    client: Client,
    url: String,
    size: u64,
}

impl HttpRangeFetcher {
    /// Create a fetcher and probe the remote size.
    ///
    /// Sends one HEAD request (retried on transport failures with the stream's
    /// retry policy, and abandoned when its token is cancelled) and takes the
    /// size from Content-Length.
    pub async fn new(url: String, options: &HttpOptions, stream: &StreamOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .connect_timeout(options.connect_timeout)
            .user_agent(options.user_agent.as_str())
            .build()?;

        let resp = {
            let (client, url) = (&client, &url);
            stream
                .retry
                .run(&stream.cancel, move || async move {
                    Ok::<_, Error>(client.head(url).send().await?)
                })
                .await?
        };

        if !resp.status().is_success() {
            return Err(Error::HttpStatus(resp.status()));
        }

        // Only advisory: the first range request decides.
        let accept_ranges = resp
            .headers()
            .get(header::ACCEPT_RANGES)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        if !accept_ranges.contains("bytes") {
            warn!(%url, "server does not advertise Accept-Ranges: bytes");
        }

        let size = resp
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&size| size > 0)
            .ok_or(Error::MissingContentLength)?;

        debug!(%url, size, "probed remote archive");
        Ok(Self { client, url, size })
    }
}

#[async_trait]
impl RangeFetch for HttpRangeFetcher {
    async fn fetch_once(
        &self,
        offset: u64,
        buf: &mut [u8],
        progress: &mut Progress<'_>,
    ) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let end = offset + buf.len() as u64 - 1;
        let range = format!("bytes={}-{}", offset, end);
        debug!(url = %self.url, %range, "range request");

        let mut resp = self
            .client
            .get(&self.url)
            .header(header::RANGE, &range)
            .send()
            .await?;

        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(Error::RangeNotSupported(resp.status()));
        }

        let mut received = 0;
        while let Some(chunk) = resp.chunk().await? {
            let chunk_len = chunk.len().min(buf.len() - received);
            buf[received..received + chunk_len].copy_from_slice(&chunk[..chunk_len]);
            received += chunk_len;

            if !progress.report(chunk_len) || received == buf.len() {
                break;
            }
        }

        Ok(received)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn location(&self) -> &str {
        &self.url
    }
}
