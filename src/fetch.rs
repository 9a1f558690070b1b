//! Remote fetch capability.
//!
//! [`Fetch`] is the seam the resolver depends on; [`HttpFetcher`] implements
//! it with `reqwest`. Options follow the familiar fetch-style request shape:
//!
//! | Option | Meaning |
//! |---|---|
//! | `method` | HTTP method, default `GET` |
//! | `headers` | string → string map |
//! | `body` | request body as a string |
//! | `timeout` | per-request timeout in milliseconds, `0` disables |
//! | `redirect` | `follow`, `manual` or `error` |
//! | `follow` | maximum redirects when following |
//! | `size` | maximum body size in bytes, `0` = unlimited |
//!
//! Anything else is ignored. Non-2xx responses still hand back their body.

use futures_util::{StreamExt, TryStreamExt};
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FetchConfig;
use crate::source::ByteStream;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid fetch options: {0}")]
    InvalidOptions(String),
}

/// Retrieve a remote resource as a byte stream.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(
        &self,
        url: &str,
        options: &Map<String, Value>,
    ) -> impl Future<Output = Result<ByteStream, FetchError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Redirect {
    Follow,
    Manual,
    Error,
}

#[derive(Debug, Default, Deserialize)]
struct RequestOptions {
    method: Option<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    body: Option<String>,
    timeout: Option<u64>,
    redirect: Option<Redirect>,
    follow: Option<usize>,
    size: Option<u64>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

impl RequestOptions {
    fn parse(options: &Map<String, Value>) -> Result<Self, FetchError> {
        let parsed: Self = serde_json::from_value(Value::Object(options.clone()))
            .map_err(|e| FetchError::InvalidOptions(e.to_string()))?;
        for key in parsed.other.keys() {
            debug!(option = %key, "ignoring unsupported fetch option");
        }
        Ok(parsed)
    }

    fn method(&self) -> Result<reqwest::Method, FetchError> {
        match &self.method {
            None => Ok(reqwest::Method::GET),
            Some(m) => reqwest::Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                .map_err(|_| FetchError::InvalidOptions(format!("unknown method '{m}'"))),
        }
    }

    /// Redirect policy, when it differs from the client default.
    fn policy(&self) -> Option<Policy> {
        match (self.redirect, self.follow) {
            (Some(Redirect::Manual), _) => Some(Policy::none()),
            (Some(Redirect::Error), _) => {
                Some(Policy::custom(|attempt| attempt.error("redirect not allowed")))
            }
            (_, Some(max)) => Some(Policy::limited(max)),
            (Some(Redirect::Follow) | None, None) => None,
        }
    }
}

/// Cap the total body length; overflow surfaces as a stream error.
fn limit_size(stream: ByteStream, limit: u64) -> ByteStream {
    let mut seen = 0u64;
    Box::pin(stream.map(move |chunk| {
        let chunk = chunk?;
        seen += chunk.len() as u64;
        if seen > limit {
            Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("content size over limit: {limit}"),
            ))
        } else {
            Ok(chunk)
        }
    }))
}

/// `reqwest`-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Self::builder(config, Some(Duration::from_secs(config.timeout_secs))).build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    fn builder(config: &FetchConfig, timeout: Option<Duration>) -> reqwest::ClientBuilder {
        let builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .redirect(Policy::limited(config.max_redirects));
        match timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    /// Redirect policy and the total timeout are per client in reqwest, so
    /// overriding either gets a one-off client.
    fn client_for(&self, options: &RequestOptions) -> Result<reqwest::Client, FetchError> {
        let unbounded = options.timeout == Some(0);
        let policy = options.policy();
        if policy.is_none() && !unbounded {
            return Ok(self.client.clone());
        }
        let timeout = (!unbounded).then(|| Duration::from_secs(self.config.timeout_secs));
        let builder = Self::builder(&self.config, timeout);
        let builder = match policy {
            Some(policy) => builder.redirect(policy),
            None => builder,
        };
        Ok(builder.build()?)
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        options: &Map<String, Value>,
    ) -> Result<ByteStream, FetchError> {
        let options = RequestOptions::parse(options)?;
        let method = options.method()?;
        let client = self.client_for(&options)?;

        let mut request = client.request(method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name, value);
        }
        if let Some(body) = options.body.clone() {
            request = request.body(body);
        }
        if let Some(ms) = options.timeout.filter(|ms| *ms > 0) {
            request = request.timeout(Duration::from_millis(ms));
        }

        debug!(%method, url, "fetching remote source");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "remote source answered with non-success status");
        }

        let stream: ByteStream = Box::pin(response.bytes_stream().map_err(io::Error::other));
        Ok(match options.size.filter(|s| *s > 0) {
            Some(limit) => limit_size(stream, limit),
            None => stream,
        })
    }
}
