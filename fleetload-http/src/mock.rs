//! Scripted in-memory transport
//!
//! Rules match on method plus a URL fragment. The most recently added matching
//! rule wins, so a test can register a broad fallback first and narrower
//! overrides after it. A rule holding a sequence replays its responses in
//! order and then keeps repeating the last one.

use crate::client::Transport;
use crate::errors::HttpError;
use crate::types::{ApiRequest, ApiResponse, HttpMethod};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Canned response
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, "")
    }
}

type Responder = Arc<dyn Fn(&ApiRequest) -> MockResponse + Send + Sync>;

enum Reply {
    Sequence(VecDeque<MockResponse>),
    Dynamic(Responder),
}

struct MockRule {
    method: HttpMethod,
    url_fragment: String,
    reply: Reply,
}

impl MockRule {
    fn matches(&self, request: &ApiRequest) -> bool {
        self.method == request.method && request.url.contains(&self.url_fragment)
    }

    fn next(&mut self, request: &ApiRequest) -> MockResponse {
        match self.reply {
            Reply::Sequence(ref mut queue) => {
                if queue.len() > 1 {
                    queue.pop_front().unwrap_or_else(|| MockResponse::empty(500))
                } else {
                    queue.front().cloned().unwrap_or_else(|| MockResponse::empty(500))
                }
            }
            Reply::Dynamic(ref responder) => responder(request),
        }
    }
}

/// A request the mock received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Scripted transport for tests
#[derive(Clone, Default)]
pub struct MockTransport {
    rules: Arc<Mutex<Vec<MockRule>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    fallback: Option<MockResponse>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Response for requests no rule matches; without it they fail as
    /// transport errors
    pub fn with_fallback(mut self, response: MockResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Always answer `response`
    pub fn respond(&self, method: HttpMethod, url_fragment: &str, response: MockResponse) {
        self.respond_sequence(method, url_fragment, vec![response]);
    }

    /// Answer with `responses` in order, then repeat the last one
    pub fn respond_sequence(
        &self,
        method: HttpMethod,
        url_fragment: &str,
        responses: Vec<MockResponse>,
    ) {
        self.rules.lock().push(MockRule {
            method,
            url_fragment: url_fragment.to_string(),
            reply: Reply::Sequence(responses.into()),
        });
    }

    /// Compute each answer from the request
    pub fn respond_with<F>(&self, method: HttpMethod, url_fragment: &str, responder: F)
    where
        F: Fn(&ApiRequest) -> MockResponse + Send + Sync + 'static,
    {
        self.rules.lock().push(MockRule {
            method,
            url_fragment: url_fragment.to_string(),
            reply: Reply::Dynamic(Arc::new(responder)),
        });
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Requests matching a method and URL fragment
    pub fn requests_matching(&self, method: HttpMethod, url_fragment: &str) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.url.contains(url_fragment))
            .cloned()
            .collect()
    }

    pub fn count(&self, method: HttpMethod, url_fragment: &str) -> usize {
        self.requests_matching(method, url_fragment).len()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url.clone(),
            authorization: request.header("Authorization").map(str::to_string),
            body: request.json_body().cloned(),
        });

        let response = {
            let mut rules = self.rules.lock();
            rules
                .iter_mut()
                .rev()
                .find(|rule| rule.matches(&request))
                .map(|rule| rule.next(&request))
        };

        match response.or_else(|| self.fallback.clone()) {
            Some(response) => Ok(ApiResponse::new(response.status, response.body)),
            None => {
                debug!("No mock response for {} {}", request.method, request.url);
                Err(HttpError::InvalidUrl(format!(
                    "No mock response available for {} {}",
                    request.method, request.url
                )))
            }
        }
    }
}
