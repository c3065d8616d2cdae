//! Incoming HTTP request type.

use std::borrow::Cow;
use std::net::SocketAddr;

use http::{HeaderMap, Method, Uri};

use crate::context::{RequestContext, RequestId};

/// An incoming HTTP request as seen by handlers and middleware.
///
/// The body is not buffered: none of the service's routes read one.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) context: RequestContext,
}

impl Request {
    /// Builds a request from any `http::Request`, discarding its body.
    ///
    /// `remote_addr` is the transport-level peer, when known.
    pub fn from_http<B>(req: http::Request<B>, remote_addr: Option<SocketAddr>) -> Self {
        let (parts, _body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            remote_addr,
            context: RequestContext::default(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }
    pub fn context(&self) -> &RequestContext { &self.context }

    /// Shortcut for `self.context().request_id()`.
    pub fn request_id(&self) -> &RequestId {
        self.context.request_id()
    }

    /// Case-insensitive header lookup, first value only.
    ///
    /// Bytes outside visible ASCII are decoded as UTF-8, with invalid
    /// sequences replaced by `U+FFFD`; such values are never dropped.
    pub fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers.get(name).map(|v| String::from_utf8_lossy(v.as_bytes()))
    }

    /// Returns the first value of a query-string parameter, percent- and
    /// `+`-decoded.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }
}
