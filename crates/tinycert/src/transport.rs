//! HTTP transport for signed form requests

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::error::Result;

/// Content type of every request body
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Sends one encoded form body and returns the raw response
///
/// Implementations must not retry. Any status code counts as a response;
/// only failures that produce no response at all are errors.
pub trait Transport: Send + Sync {
    fn post_form(&self, url: &str, body: String) -> Result<RawResponse>;
}

/// Blocking reqwest transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, url: &str, body: String) -> Result<RawResponse> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()?;

        let status = response.status().as_u16();
        let body = response.text()?;
        debug!("POST {} -> {} ({} bytes)", url, status, body.len());

        Ok(RawResponse { status, body })
    }
}
