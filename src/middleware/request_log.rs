//! Correlation and request-logging middleware.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use super::request_id::{self, REQUEST_ID_HEADER};
use crate::handler::{BoxFuture, Service};
use crate::request::Request;

/// Wraps a service so that every request is identified, timed and logged.
///
/// For each request:
/// 1. the correlation id is resolved (see [`request_id::resolve`]) and stored
///    in the request's [`RequestContext`](crate::RequestContext);
/// 2. the inner service runs, timed from just before the call to just after;
/// 3. the response status is read back (`200` unless the handler set one);
/// 4. one `INFO` record with `component="http"` is emitted, after every
///    record the handler produced;
/// 5. the id is echoed on the response in `X-Request-ID`.
///
/// Panics in the inner service are not caught; such a request is never
/// logged.
pub struct RequestLog<S> {
    inner: Arc<S>,
}

impl<S: Service> RequestLog<S> {
    pub fn new(inner: S) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

impl<S: Service> Service for RequestLog<S> {
    fn call(&self, mut req: Request) -> BoxFuture {
        let inner = Arc::clone(&self.inner);

        Box::pin(async move {
            let id = request_id::resolve(req.headers());
            req.context.set_request_id(id.clone());

            let method = req.method().clone();
            let path = req.path().to_owned();
            let user_agent = req.header("user-agent").map(Cow::into_owned).unwrap_or_default();
            let remote_ip = remote_ip(&req);

            let start = Instant::now();
            let mut response = inner.call(req).await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let status = response.status_code();
            response.set_header(REQUEST_ID_HEADER, id.as_str());

            info!(
                component = "http",
                request_id = %id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                user_agent = %user_agent,
                remote_ip = %remote_ip,
                duration_ms,
                "request completed"
            );

            response
        })
    }
}

/// Client address for logging.
///
/// `X-Forwarded-For` wins when present (verbatim, the whole list). Otherwise
/// the IP of the transport peer. Empty when neither is known.
pub fn remote_ip(req: &Request) -> String {
    if let Some(forwarded) = req.header("x-forwarded-for").filter(|v| !v.is_empty()) {
        return forwarded.into_owned();
    }
    req.remote_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use http::StatusCode;

    use super::*;
    use crate::response::Response;
    use crate::router::Router;

    fn request(headers: &[(&str, &str)], remote: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let remote = remote.map(|r| r.parse::<SocketAddr>().unwrap());
        Request::from_http(builder.body(()).unwrap(), remote)
    }

    async fn echo_id(req: Request) -> String {
        req.request_id().to_string()
    }

    async fn teapot(_req: Request) -> Response {
        Response::status(StatusCode::IM_A_TEAPOT)
    }

    #[test]
    fn forwarded_for_wins() {
        let req = request(&[("X-Forwarded-For", "10.0.0.1, 10.0.0.2")], Some("127.0.0.1:5000"));
        assert_eq!(remote_ip(&req), "10.0.0.1, 10.0.0.2");
    }

    #[test]
    fn non_ascii_forwarded_for_is_kept() {
        let raw = http::Request::builder()
            .uri("/")
            .header("X-Forwarded-For", http::HeaderValue::from_bytes("hôte-1".as_bytes()).unwrap())
            .body(())
            .unwrap();
        let req = Request::from_http(raw, Some("127.0.0.1:5000".parse().unwrap()));
        assert_eq!(remote_ip(&req), "hôte-1");
    }

    #[test]
    fn falls_back_to_peer_host() {
        assert_eq!(remote_ip(&request(&[], Some("192.168.1.7:41000"))), "192.168.1.7");
        assert_eq!(remote_ip(&request(&[], Some("[::1]:41000"))), "::1");
    }

    #[test]
    fn empty_when_unknown() {
        assert_eq!(remote_ip(&request(&[], None)), "");
    }

    #[tokio::test]
    async fn handler_sees_inbound_id_and_it_is_echoed() {
        let app = RequestLog::new(Router::new().route("/", echo_id));
        let res = app.call(request(&[("X-Request-ID", "abc123")], None)).await;
        assert_eq!(res.body(), b"abc123");
        assert_eq!(res.header(REQUEST_ID_HEADER), Some("abc123"));
    }

    #[tokio::test]
    async fn non_ascii_inbound_id_is_echoed() {
        let app = RequestLog::new(Router::new().route("/", echo_id));
        let raw = http::Request::builder()
            .uri("/")
            .header("X-Request-ID", http::HeaderValue::from_bytes("café-1".as_bytes()).unwrap())
            .body(())
            .unwrap();
        let res = app.call(Request::from_http(raw, None)).await;
        assert_eq!(res.body(), "café-1".as_bytes());
        assert_eq!(res.header(REQUEST_ID_HEADER), Some("café-1"));
    }

    #[tokio::test]
    async fn handler_sees_generated_id() {
        let app = RequestLog::new(Router::new().route("/", echo_id));
        let res = app.call(request(&[], None)).await;
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert_eq!(body.len(), 16);
        assert_eq!(res.header(REQUEST_ID_HEADER), Some(body.as_str()));
    }

    #[tokio::test]
    async fn explicit_status_passes_through() {
        let app = RequestLog::new(Router::new().route("/", teapot));
        let res = app.call(request(&[], None)).await;
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
    }
}
