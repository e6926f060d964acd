//! Transport abstraction for talking to the sync server.

use crate::error::SyncResult;
use parking_lot::Mutex;
use rolodex_sync_protocol::{format_instant, PullResponse, PushRequest, PushResponse};
use std::collections::VecDeque;
use std::fmt;

/// A bearer token authorizing sync requests.
///
/// The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the raw secret for the `Authorization` header.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

/// Provides the current access token, if any.
///
/// Returning `None` means the credential vault is locked or the user
/// is signed out; the engine fails the cycle before touching the
/// network or mutating the outbox.
pub trait TokenSource: Send + Sync {
    /// Returns the current token, or `None` when unavailable.
    fn access_token(&self) -> Option<AccessToken>;
}

/// A token source backed by a fixed, optional token.
#[derive(Debug, Default)]
pub struct StaticTokenSource {
    token: Option<AccessToken>,
}

impl StaticTokenSource {
    /// A source that always yields the given token.
    pub fn with_token(secret: impl Into<String>) -> Self {
        Self {
            token: Some(AccessToken::new(secret)),
        }
    }

    /// A source that never yields a token.
    pub fn locked() -> Self {
        Self { token: None }
    }
}

impl TokenSource for StaticTokenSource {
    fn access_token(&self) -> Option<AccessToken> {
        self.token.clone()
    }
}

/// Transport for sync requests.
pub trait SyncTransport: Send + Sync {
    /// Transmits one push batch and returns the server's verdict.
    fn push(&self, token: &AccessToken, request: &PushRequest) -> SyncResult<PushResponse>;

    /// Fetches the delta of changes since the given watermark.
    ///
    /// `since` is the RFC 3339 watermark, or `None` for a full pull.
    fn pull(&self, token: &AccessToken, since: Option<&str>) -> SyncResult<PullResponse>;
}

/// Scriptable in-memory transport for tests.
///
/// Responses are consumed in FIFO order. With nothing scripted, a push
/// acknowledges every item in the batch and a pull returns an empty
/// delta stamped with the current time.
#[derive(Default)]
pub struct MockTransport {
    push_script: Mutex<VecDeque<SyncResult<PushResponse>>>,
    pull_script: Mutex<VecDeque<SyncResult<PullResponse>>>,
    push_requests: Mutex<Vec<PushRequest>>,
    pull_sinces: Mutex<Vec<Option<String>>>,
}

impl MockTransport {
    /// Creates a transport with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next push result.
    pub fn enqueue_push(&self, result: SyncResult<PushResponse>) {
        self.push_script.lock().push_back(result);
    }

    /// Queues the next pull result.
    pub fn enqueue_pull(&self, result: SyncResult<PullResponse>) {
        self.pull_script.lock().push_back(result);
    }

    /// Returns every push request transmitted so far.
    pub fn push_requests(&self) -> Vec<PushRequest> {
        self.push_requests.lock().clone()
    }

    /// Returns the `since` watermark of every pull so far.
    pub fn pull_sinces(&self) -> Vec<Option<String>> {
        self.pull_sinces.lock().clone()
    }
}

impl SyncTransport for MockTransport {
    fn push(&self, _token: &AccessToken, request: &PushRequest) -> SyncResult<PushResponse> {
        self.push_requests.lock().push(request.clone());
        match self.push_script.lock().pop_front() {
            Some(result) => result,
            None => Ok(PushResponse::applied(
                request.batch.iter().map(|item| item.id).collect(),
            )),
        }
    }

    fn pull(&self, _token: &AccessToken, since: Option<&str>) -> SyncResult<PullResponse> {
        self.pull_sinces.lock().push(since.map(str::to_string));
        match self.pull_script.lock().pop_front() {
            Some(result) => result,
            None => Ok(PullResponse::empty(format_instant(chrono::Utc::now()))),
        }
    }
}
