use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use thiserror::Error;
use url::Url;

/// Upstream reply. A 404 is a response like any other, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn ok(content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: None,
            body: Bytes::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    pub fn text(&self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {0}")]
    InvalidUrl(String),
    #[error("request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Network capability: one GET per call.
pub trait Fetch: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, FetchError>>;
}

/// `reqwest`-backed fetcher. Relative URLs (local proxy paths) are joined
/// onto `base` when one is configured.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    base: Option<Url>,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, base: None }
    }

    pub fn with_timeout(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client))
    }

    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    fn absolute(&self, url: &str) -> Result<Url, FetchError> {
        match Url::parse(url) {
            Ok(u) => Ok(u),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base
                .as_ref()
                .and_then(|b| b.join(url).ok())
                .ok_or_else(|| FetchError::InvalidUrl(url.to_string())),
            Err(_) => Err(FetchError::InvalidUrl(url.to_string())),
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        Box::pin(async move {
            let target = self.absolute(url)?;
            let network = |e: reqwest::Error| FetchError::Network {
                url: url.to_string(),
                source: Box::new(e),
            };

            let resp = self.client.get(target).send().await.map_err(network)?;
            let status = resp.status().as_u16();
            let content_type = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = resp.bytes().await.map_err(network)?;

            Ok(FetchResponse {
                status,
                content_type,
                body,
            })
        })
    }
}

#[derive(Debug, Clone)]
enum Canned {
    Response(FetchResponse),
    Unreachable,
}

/// In-memory fetcher for tests and offline tooling.
///
/// Unknown URLs answer 404. Every requested URL is recorded in order.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    routes: Mutex<HashMap<String, Canned>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        let body = Bytes::from(text.into());
        self.with_response(url, FetchResponse::ok(Some("text/plain"), body))
    }

    pub fn with_status(self, url: impl Into<String>, status: u16) -> Self {
        self.with_response(url, FetchResponse::status(status))
    }

    pub fn with_response(self, url: impl Into<String>, response: FetchResponse) -> Self {
        self.routes
            .lock()
            .insert(url.into(), Canned::Response(response));
        self
    }

    pub fn with_unreachable(self, url: impl Into<String>) -> Self {
        self.routes.lock().insert(url.into(), Canned::Unreachable);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl Fetch for MemoryFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, FetchError>> {
        self.requests.lock().push(url.to_string());
        let canned = self.routes.lock().get(url).cloned();
        Box::pin(async move {
            match canned {
                Some(Canned::Response(r)) => Ok(r),
                Some(Canned::Unreachable) => Err(FetchError::Network {
                    url: url.to_string(),
                    source: Box::new(std::io::Error::from(
                        std::io::ErrorKind::ConnectionRefused,
                    )),
                }),
                None => Ok(FetchResponse::status(404)),
            }
        })
    }
}
