//! # HTTP Retrieval Utilities
//!
//! An asynchronous JSON client wrapper around `reqwest`. Every request is
//! bounded by the timeout given at construction so a hung upstream cannot stall
//! the caller, and transient failures can be retried with exponential backoff.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;

use crate::errors::FeedError;

const USER_AGENT: &str = concat!("server_tennis/", env!("CARGO_PKG_VERSION"));

/// A standardized container for API responses.
///
/// Non-2xx answers are not errors at this level: they come back with
/// `success == false` and whatever error body the server sent.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The deserialized body of a 2xx response.
    pub data: Option<T>,
    /// The raw body of a non-2xx response, if readable.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// A JSON-over-HTTP client with a bounded timeout.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
}

impl ApiClient {
    /// Creates a client whose requests give up after `timeout` and retry
    /// transient failures up to `max_retries` times.
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, FeedError> {
        let base = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedError::Client(e.to_string()))?;

        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let inner = ClientBuilder::new(base)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { inner })
    }

    /// Performs a GET and deserializes a 2xx body as `T`.
    ///
    /// # Errors
    /// `FeedError::Timeout` or `FeedError::Transport` when no response arrived,
    /// `FeedError::Malformed` when a 2xx body is not valid JSON for `T`.
    pub async fn get_json<T>(&self, url: &str) -> Result<ApiResponse<T>, FeedError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|e| middleware_error(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();

        if status.is_success() {
            let data = response
                .json::<T>()
                .await
                .map_err(|e| reqwest_error(url, e))?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers,
            })
        } else {
            // Capture the error body as a string for debugging
            let error_body = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body,
                status: status.as_u16(),
                success: false,
                headers,
            })
        }
    }
}

fn middleware_error(url: &str, err: reqwest_middleware::Error) -> FeedError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => reqwest_error(url, e),
        reqwest_middleware::Error::Middleware(e) => FeedError::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        },
    }
}

fn reqwest_error(url: &str, err: reqwest::Error) -> FeedError {
    if err.is_timeout() {
        FeedError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_decode() {
        FeedError::Malformed(err.to_string())
    } else {
        FeedError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
