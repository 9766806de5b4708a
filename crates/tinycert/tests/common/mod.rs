//! Recording stub transport shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tinycert::{RawResponse, Result, Session, SessionConfig, TinyCertError, Transport};
use url::form_urlencoded;

pub const API_KEY: &str = "test-api-key";
pub const SERVER: &str = "https://tinycert.test/api/v1/";

/// One request as seen by the stub
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub body: String,
}

impl RecordedRequest {
    /// Endpoint name relative to the server root
    pub fn endpoint(&self) -> &str {
        self.url.strip_prefix(SERVER).unwrap_or(&self.url)
    }

    /// Decoded form pairs in transmitted order
    pub fn pairs(&self) -> Vec<(String, String)> {
        form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<String> {
        self.pairs()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.pairs().into_iter().map(|(n, _)| n).collect()
    }

    /// Body text before the trailing digest field
    pub fn signed_part(&self) -> &str {
        match self.body.rfind("&digest=") {
            Some(pos) => &self.body[..pos],
            None => "",
        }
    }
}

/// Scripted reply
#[derive(Debug, Clone)]
pub enum StubReply {
    Response(RawResponse),
    Unreachable,
}

/// Transport that replays scripted responses and records every request
#[derive(Debug, Clone, Default)]
pub struct StubTransport {
    replies: Arc<Mutex<VecDeque<StubReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, status: u16, body: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(StubReply::Response(RawResponse::new(status, body)));
        self
    }

    pub fn fail(&self) -> &Self {
        self.replies.lock().unwrap().push_back(StubReply::Unreachable);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for StubTransport {
    fn post_form(&self, url: &str, body: String) -> Result<RawResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            body,
        });

        match self.replies.lock().unwrap().pop_front() {
            Some(StubReply::Response(response)) => Ok(response),
            Some(StubReply::Unreachable) => {
                Err(TinyCertError::Transport("connection refused".to_string()))
            }
            None => panic!("stub transport ran out of scripted replies"),
        }
    }
}

pub fn test_config() -> SessionConfig {
    SessionConfig::builder()
        .email("ops@example.com")
        .passphrase("correct horse")
        .api_key(API_KEY)
        .server_url(SERVER)
        .build()
        .unwrap()
}

/// Unconnected session over a fresh stub
pub fn stub_session() -> (Session<StubTransport>, StubTransport) {
    let transport = StubTransport::new();
    let session = Session::with_transport(test_config(), transport.clone());
    (session, transport)
}

/// Session that has already completed `connect` with token `tok-1`
pub fn connected_session() -> (Session<StubTransport>, StubTransport) {
    let (mut session, transport) = stub_session();
    transport.reply(200, r#"{"token": "tok-1"}"#);
    session.connect().unwrap();
    (session, transport)
}
