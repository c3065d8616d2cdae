//! Per-request context.
//!
//! Every [`Request`](crate::Request) carries one [`RequestContext`]. The
//! request-log middleware fills in the correlation id before the handler
//! runs; handlers only ever get read access to it.

use std::fmt;

/// Correlation id for one request.
///
/// Either taken verbatim from the caller's `X-Request-ID` header or generated
/// by [`middleware::request_id`](crate::middleware::request_id). Empty when
/// the handler chain is not wrapped in the request-log middleware.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Request-scoped values, created with the request and dropped with it.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    request_id: RequestId,
}

impl RequestContext {
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub(crate) fn set_request_id(&mut self, id: RequestId) {
        self.request_id = id;
    }
}
