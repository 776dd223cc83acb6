//! HTTP glue shared by every CPCB-facing client: a pooled `reqwest` client
//! with the portal's headers and cookie, bounded retries with exponential
//! backoff, and the certificate-fallback policy the portal unfortunately
//! requires (its TLS chain is broken often enough that a verified handshake
//! cannot be assumed).

use crate::envelope::{self, EnvelopeError};
use futures_util::TryStreamExt;
use log::{info, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, COOKIE, REFERER};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

pub const BASE_URL: &str = "https://airquality.cpcb.gov.in";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed after {attempts} attempts")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {url}")]
    Envelope {
        url: String,
        #[source]
        source: EnvelopeError,
    },

    #[error("failed to parse JSON response from {0}")]
    Json(String, #[source] reqwest::Error),

    #[error("I/O error writing download to '{0}'")]
    DownloadIo(PathBuf, #[source] std::io::Error),
}

/// Shared HTTP transport. Cheap to clone the inner clients; hold it behind an
/// `Arc` and reuse it across sub-clients so connection pools are shared.
pub struct Transport {
    client: Client,
    fallback: Client,
    max_retries: u32,
    backoff: Duration,
}

impl Transport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(TransportError::ClientBuild)?;
        // Second client with certificate verification disabled. Only used
        // after a verified attempt fails at the connection layer.
        let fallback = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(TransportError::ClientBuild)?;
        Ok(Self {
            client,
            fallback,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        })
    }

    fn envelope_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("q=0.8;application/json;q=0.9"),
        );
        headers.insert(REFERER, HeaderValue::from_static(BASE_URL));
        headers.insert(COOKIE, HeaderValue::from_static("ccr_public=A"));
        headers
    }

    /// One request attempt, falling back to the unverified client when the
    /// verified handshake cannot be established.
    async fn send_once(
        &self,
        method: Method,
        url: &str,
        headers: Option<&HeaderMap>,
        body: Option<&str>,
    ) -> Result<Response, reqwest::Error> {
        let build = |client: &Client| {
            let mut request = client.request(method.clone(), url);
            if let Some(headers) = headers {
                request = request.headers(headers.clone());
            }
            if let Some(body) = body {
                request = request.body(body.to_string());
            }
            request
        };

        match build(&self.client).send().await {
            Ok(response) => Ok(response),
            Err(e) if e.is_connect() => {
                warn!("TLS/connect failure for {url}: {e}; retrying with certificate verification disabled");
                build(&self.fallback).send().await
            }
            Err(e) => Err(e),
        }
    }

    /// Sends a request with retries. Client errors (4xx) are returned
    /// immediately; everything else backs off exponentially.
    async fn send_with_retries(
        &self,
        method: Method,
        url: &str,
        headers: Option<&HeaderMap>,
        body: Option<&str>,
    ) -> Result<Response, TransportError> {
        let mut last_error: Option<reqwest::Error> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let wait = self.backoff * 2u32.saturating_pow(attempt - 1);
                info!(
                    "retrying {url} (attempt {}/{}) after {wait:?}",
                    attempt + 1,
                    self.max_retries + 1
                );
                tokio::time::sleep(wait).await;
            }

            match self.send_once(method.clone(), url, headers, body).await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => return Ok(response),
                    Err(e) => {
                        let status = e.status();
                        if status.is_some_and(|s| s.is_client_error()) {
                            return Err(TransportError::HttpStatus {
                                url: url.to_string(),
                                status: status.unwrap_or(StatusCode::BAD_REQUEST),
                                source: e,
                            });
                        }
                        warn!("server error for {url}: {e}");
                        last_error = Some(e);
                    }
                },
                Err(e) => {
                    warn!("request error for {url}: {e}");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(TransportError::RetriesExhausted {
                url: url.to_string(),
                attempts: self.max_retries + 1,
                source,
            }),
            // max_retries is at least 0, so the loop ran and set last_error
            // on every failure path; reaching here means no attempt was made.
            None => unreachable!("retry loop exited without a result"),
        }
    }

    /// POSTs a JSON payload through the base64 envelope and decodes the
    /// enveloped JSON response.
    pub async fn post_envelope(&self, url: &str, payload: &Value) -> Result<Value, TransportError> {
        let body = envelope::encode(payload);
        let headers = Self::envelope_headers();
        let response = self
            .send_with_retries(Method::POST, url, Some(&headers), Some(&body))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::NetworkRequest(url.to_string(), e))?;
        envelope::decode(&bytes).map_err(|source| TransportError::Envelope {
            url: url.to_string(),
            source,
        })
    }

    /// Plain JSON GET, used for the odd non-CPCB endpoint (IP geolocation).
    pub async fn get_json(&self, url: &str) -> Result<Value, TransportError> {
        let response = self.send_with_retries(Method::GET, url, None, None).await?;
        response
            .json()
            .await
            .map_err(|e| TransportError::Json(url.to_string(), e))
    }

    /// GETs a resource into memory. Suitable for CSV archives; large rasters
    /// should go through [`Transport::download_to`] instead.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.send_with_retries(Method::GET, url, None, None).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::NetworkRequest(url.to_string(), e))?;
        Ok(bytes.to_vec())
    }

    /// Streams a download straight to `dest`, returning the byte count.
    /// `dest` is removed again if the stream breaks partway.
    pub async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, TransportError> {
        let response = self.send_with_retries(Method::GET, url, None, None).await?;
        let total = response.content_length();
        info!(
            "downloading {url} to {} ({})",
            dest.display(),
            total.map_or_else(|| "unknown size".to_string(), |n| format!("{n} bytes"))
        );

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(stream);

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| TransportError::DownloadIo(dest.to_path_buf(), e))?;

        let written = match tokio::io::copy(&mut reader, &mut file).await {
            Ok(written) => written,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(dest).await;
                return Err(TransportError::DownloadIo(dest.to_path_buf(), e));
            }
        };
        file.flush()
            .await
            .map_err(|e| TransportError::DownloadIo(dest.to_path_buf(), e))?;

        info!("download complete: {written} bytes to {}", dest.display());
        Ok(written)
    }
}
