//! Liveness probe.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure → restart. |

use crate::{Request, Response};

/// Liveness probe handler.
///
/// Always returns `200 OK` with body `"healthy\n"`. If the process can
/// respond to HTTP at all, it is alive, so this handler has no dependencies
/// and logs nothing of its own.
pub async fn liveness(_req: Request) -> Response {
    Response::text("healthy\n")
}
