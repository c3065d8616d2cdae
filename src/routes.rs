//! The service's route handlers and the assembled application.

use std::time::Duration;

use http::StatusCode;
use tracing::{debug, error, info, warn};

use crate::middleware::RequestLog;
use crate::{Request, Response, Router, health};

/// How long `/work` pretends to be busy.
pub const WORK_DELAY: Duration = Duration::from_millis(150);

/// Task name used when `/work` gets no `task` parameter.
pub const DEFAULT_TASK: &str = "simulate";

/// The full application: `/`, `/work` and `/healthz` behind the request-log
/// middleware. Unmatched paths are answered by the greeting handler.
pub fn app() -> RequestLog<Router> {
    RequestLog::new(
        Router::new()
            .route("/", hello)
            .route("/work", work)
            .route("/healthz", health::liveness)
            .fallback(hello),
    )
}

/// `GET /`
pub async fn hello(req: Request) -> Response {
    debug!(component = "app", request_id = %req.request_id(), "handling hello");
    Response::text("hello from go-log-service\n")
}

/// `GET /work?task=<name>`
///
/// Sleeps for [`WORK_DELAY`], then fails with `500` when the task name
/// contains `fail`. Successful runs always log a warning before completing.
pub async fn work(req: Request) -> Response {
    let id = req.request_id();
    let task = req
        .query("task")
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TASK.to_owned());

    info!(component = "worker", request_id = %id, task = %task, "starting work");
    tokio::time::sleep(WORK_DELAY).await;

    if task.contains("fail") {
        error!(component = "worker", request_id = %id, task = %task, "work failed");
        return Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header("x-content-type-options", "nosniff")
            .text("failed\n");
    }

    warn!(component = "worker", request_id = %id, task = %task, "work had minor issues");
    info!(component = "worker", request_id = %id, task = %task, "work done");
    Response::text("ok\n")
}
