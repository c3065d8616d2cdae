//! Logger construction.
//!
//! The logger is built once in `main` and passed to the [`Server`](crate::Server),
//! which attaches it to every connection and request future. Nothing is
//! installed as the process-wide default subscriber.

use tracing::Dispatch;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

/// Human-readable console logger on stdout with RFC 3339 UTC timestamps.
///
/// Each record is formatted into one buffer and written with a single call,
/// so concurrent requests never interleave within a line.
pub fn logger(level: LevelFilter) -> Dispatch {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_max_level(level)
        .with_timer(ChronoUtc::rfc_3339())
        .with_target(false)
        .finish();
    Dispatch::new(subscriber)
}
