//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns. A middleware wraps one [`Service`](crate::Service)
//! and is itself a `Service`, so layers nest by plain construction:
//!
//! ```rust
//! use log_service::{Request, Router};
//! use log_service::middleware::RequestLog;
//!
//! async fn hello(_req: Request) -> &'static str { "hi\n" }
//!
//! let app = RequestLog::new(Router::new().route("/", hello));
//! ```
//!
//! Built-in middleware:
//! - [`request_id`] — correlation id resolution and generation
//! - [`RequestLog`] — per-request correlation id, timing, status capture and
//!   one completion record

pub mod request_id;
mod request_log;

pub use request_log::{RequestLog, remote_ip};
