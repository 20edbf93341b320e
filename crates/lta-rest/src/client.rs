//! Bearer-authenticated JSON transport shared by the service clients.
//!
//! # Design
//! - One `reqwest::Client` per service, carrying that service's timeout.
//! - Connect errors, timeouts and 5xx responses are retried with jittered
//!   exponential backoff; any other failure is returned immediately.
//! - Error values keep the service, operation and URL so a quarantine reason
//!   names the call that failed.

use std::time::Duration;

use lta_core::{LtaError, LtaResult};
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

const BASE_DELAY_MS: u64 = 250;
const MAX_DELAY_MS: u64 = 10_000;

/// Connection settings for one REST service.
#[derive(Clone)]
pub struct RestSettings {
    /// Service base URL; a missing trailing slash is added.
    pub base_url: Url,
    /// Bearer token.
    pub token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Additional attempts for transient failures.
    pub retries: u32,
}

/// JSON client bound to one service.
#[derive(Clone)]
pub struct RestClient {
    service: &'static str,
    http: Client,
    base_url: Url,
    token: String,
    retries: u32,
}

impl RestClient {
    /// Build a client for `service` (used in logs and error context).
    ///
    /// # Errors
    ///
    /// Returns [`LtaError::Transport`] if the HTTP client cannot be constructed.
    pub fn new(service: &'static str, settings: RestSettings) -> LtaResult<Self> {
        let base_url = with_trailing_slash(settings.base_url);
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| LtaError::Transport {
                service,
                operation: "client.build",
                url: base_url.to_string(),
                source: Box::new(source),
            })?;
        Ok(Self {
            service,
            http,
            base_url,
            token: settings.token,
            retries: settings.retries,
        })
    }

    /// Service label used in error context.
    #[must_use]
    pub const fn service(&self) -> &'static str {
        self.service
    }

    /// Resolve `path` against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`LtaError::Transport`] when the path does not form a valid URL.
    pub fn endpoint(&self, operation: &'static str, path: &str) -> LtaResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| LtaError::Transport {
                service: self.service,
                operation,
                url: format!("{}{path}", self.base_url),
                source: Box::new(source),
            })
    }

    /// `GET` a JSON document.
    ///
    /// # Errors
    ///
    /// Propagates transport, status and decode failures.
    pub async fn get_json<T>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> LtaResult<T>
    where
        T: DeserializeOwned,
    {
        let text = self
            .execute(operation, Method::GET, path, query, None)
            .await?;
        self.decode(operation, &text)
    }

    /// Send a JSON body and decode the JSON reply.
    ///
    /// # Errors
    ///
    /// Propagates encode, transport, status and decode failures.
    pub async fn send_json<B, T>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> LtaResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.encode(operation, body)?;
        let text = self
            .execute(operation, method, path, query, Some(payload.as_slice()))
            .await?;
        self.decode(operation, &text)
    }

    /// Send a JSON body, discarding the reply.
    ///
    /// # Errors
    ///
    /// Propagates encode, transport and status failures.
    pub async fn send<B>(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: &B,
    ) -> LtaResult<()>
    where
        B: Serialize + ?Sized,
    {
        let payload = self.encode(operation, body)?;
        self.execute(operation, method, path, &[], Some(payload.as_slice()))
            .await
            .map(|_| ())
    }

    fn encode<B>(&self, operation: &'static str, body: &B) -> LtaResult<Vec<u8>>
    where
        B: Serialize + ?Sized,
    {
        serde_json::to_vec(body).map_err(|source| LtaError::Decode {
            service: self.service,
            operation,
            source,
        })
    }

    fn decode<T>(&self, operation: &'static str, text: &str) -> LtaResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(text).map_err(|source| LtaError::Decode {
            service: self.service,
            operation,
            source,
        })
    }

    async fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        payload: Option<&[u8]>,
    ) -> LtaResult<String> {
        let url = self.endpoint(operation, path)?;
        let mut attempt: u32 = 0;
        loop {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.token);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(payload) = payload {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(payload.to_vec());
            }

            debug!(service = self.service, operation, %method, url = %url, attempt, "sending request");
            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() && attempt < self.retries {
                        warn!(
                            service = self.service,
                            operation,
                            status = status.as_u16(),
                            attempt,
                            "server error; retrying"
                        );
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    let body = response
                        .text()
                        .await
                        .map_err(|source| self.transport(operation, &url, source))?;
                    if status.is_success() {
                        return Ok(body);
                    }
                    return Err(LtaError::HttpStatus {
                        service: self.service,
                        operation,
                        url: url.to_string(),
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) if is_transient(&err) && attempt < self.retries => {
                    warn!(
                        service = self.service,
                        operation,
                        error = %err,
                        attempt,
                        "transport error; retrying"
                    );
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(self.transport(operation, &url, err)),
            }
        }
    }

    fn transport(&self, operation: &'static str, url: &Url, source: reqwest::Error) -> LtaError {
        LtaError::Transport {
            service: self.service,
            operation,
            url: url.to_string(),
            source: Box::new(source),
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Exponential backoff from 250ms up to 10s with up to 50% added jitter.
fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_DELAY_MS
        .saturating_mul(2u64.saturating_pow(attempt.min(6)))
        .min(MAX_DELAY_MS);
    let jitter = rand::rng().random_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}
