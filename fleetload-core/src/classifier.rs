//! Maps HTTP outcomes onto what the worker should do next
//!
//! | status | create | delete | read |
//! |---|---|---|---|
//! | 2xx | created | confirmed | body |
//! | 401 | auth retry | auth retry | auth retry |
//! | 409 | duplicate | failed | failed |
//! | 404 | failed | confirmed | empty |
//! | 429 | throttled | failed | failed |
//! | 5xx with a "gone" reason | failed | confirmed | failed |
//! | anything else | failed | failed | failed |

use fleetload_http::ApiResponse;
use serde_json::Value;

/// Which kind of call produced the response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Create,
    Delete,
    Read,
}

/// Normalized result of one request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Creation accepted. The id comes from the body and does not imply readiness.
    Created {
        id: Option<String>,
        body: Option<Value>,
    },
    /// The resource is gone, either just deleted or already absent
    Confirmed,
    /// Successful read
    Body(Option<Value>),
    /// Read of something that does not exist
    Empty,
    /// Create rejected because the name is taken
    Duplicate,
    /// Credential rejected; refresh and try again on a later tick
    AuthRetry,
    /// Creation rate limited; stop creating
    Throttled,
    Failed {
        status: u16,
        reason: Option<String>,
    },
}

impl Outcome {
    /// Whether the request is reported as a failure in the run statistics
    pub fn counts_as_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed)
    }

    /// Id of a newly created resource
    pub fn created_id(&self) -> Option<&str> {
        match self {
            Outcome::Created { id, .. } => id.as_deref(),
            _ => None,
        }
    }
}

/// Reasons seen on 5xx delete responses when the resource is already gone.
///
/// Server-specific; a match can hide a real server fault.
const GONE_REASON_PHRASES: &[&str] = &[
    "not found",
    "failed to delete service account",
    "unable to delete kafka request",
    "unable to delete dinosaur request",
];

/// Whether an error reason says the resource no longer exists
pub fn matches_gone_reason(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    GONE_REASON_PHRASES
        .iter()
        .any(|phrase| reason.contains(phrase))
}

fn reason_of(body: Option<&Value>) -> Option<String> {
    body.and_then(|b| b.get("reason"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Classify a status and optional JSON body. Never fails.
pub fn classify(kind: OperationKind, status: u16, body: Option<&Value>) -> Outcome {
    use OperationKind::*;

    if (200..300).contains(&status) {
        return match kind {
            Create => Outcome::Created {
                id: body
                    .and_then(|b| b.get("id"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                body: body.cloned(),
            },
            Delete => Outcome::Confirmed,
            Read => Outcome::Body(body.cloned()),
        };
    }

    let reason = reason_of(body);
    match (kind, status) {
        (_, 401) => Outcome::AuthRetry,
        (Create, 409) => Outcome::Duplicate,
        (Create, 429) => Outcome::Throttled,
        (Delete, 404) => Outcome::Confirmed,
        (Read, 404) => Outcome::Empty,
        (Delete, s) if s >= 500 && reason.as_deref().is_some_and(matches_gone_reason) => {
            Outcome::Confirmed
        }
        _ => Outcome::Failed { status, reason },
    }
}

/// Classify a transport response, parsing the body leniently
pub fn classify_response(kind: OperationKind, response: &ApiResponse) -> Outcome {
    classify(kind, response.status, response.json().as_ref())
}
