//! HTTP transport for the resource cache.

use std::time::Duration;

use reqwest::{Client, Response};
use tracing::debug;

use crate::BoxFuture;
use crate::cache::{FetchError, Fetcher};

/// [`Fetcher`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn read(resp: Response) -> Result<Vec<u8>, FetchError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                message,
            });
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            debug!(%url, "GET");
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            Self::read(resp).await
        })
    }

    fn post<'a>(
        &'a self,
        url: &'a str,
        body: Vec<u8>,
        content_type: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            debug!(%url, bytes = body.len(), "POST");
            let resp = self
                .client
                .post(url)
                .header("content-type", content_type)
                .body(body)
                .send()
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;
            Self::read(resp).await
        })
    }
}
