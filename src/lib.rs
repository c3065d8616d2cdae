//! # log-service
//!
//! A minimal HTTP service that shows request correlation and structured
//! logging end to end.
//!
//! Every request passes through [`middleware::RequestLog`], which:
//!
//! - reuses the caller's `X-Request-ID` or generates a 16-hex-char id,
//! - exposes it to handlers through [`Request::request_id`],
//! - times the handler and reads back its response status,
//! - emits exactly one `request completed` record with `component="http"`.
//!
//! Routes:
//!
//! | Path | Response |
//! |---|---|
//! | `/` (and any unmatched path) | `200 hello from go-log-service` |
//! | `/work?task=<name>` | `200 ok` after 150 ms, `500 failed` if `name` contains `fail` |
//! | `/healthz` | `200 healthy` |
//!
//! ## Running it
//!
//! ```rust,no_run
//! use log_service::{Config, Server, app, telemetry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), log_service::Error> {
//!     let config = Config::from_env();
//!     let logger = telemetry::logger(config.log_level);
//!
//!     Server::bind(&config.bind_addr())
//!         .await?
//!         .logger(logger)
//!         .serve(app())
//!         .await
//! }
//! ```

mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod routes;
mod server;
mod timeout;

pub mod config;
pub mod health;
pub mod middleware;
pub mod telemetry;

pub use config::Config;
pub use context::{RequestContext, RequestId};
pub use error::Error;
pub use handler::{BoxFuture, Handler, Service};
pub use request::Request;
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use routes::{DEFAULT_TASK, WORK_DELAY, app, hello, work};
pub use server::{DEFAULT_GRACE_PERIOD, Server, shutdown_signal};
pub use timeout::Timeouts;
