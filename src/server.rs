//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C (or whatever future is passed to
//! [`Server::serve_with_shutdown`]) the server:
//! 1. Stops `listener.accept()` and closes the listening socket. No new
//!    connections are made.
//! 2. Tells every open connection to finish its in-flight request and close.
//! 3. Waits up to the grace period (5 s by default) for those connections.
//! 4. Aborts whatever is still running and returns.
//!
//! # Connection timeouts
//!
//! Every socket is wrapped in a [`TimeoutIo`] enforcing [`Timeouts`]: 5 s to
//! send a request head, 10 s to write a response, 60 s idle between
//! keep-alive requests.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, error, info, warn};

use crate::error::Error;
use crate::handler::Service;
use crate::request::Request;
use crate::timeout::{TimeoutIo, Timeouts};

/// How long in-flight connections get to finish after shutdown starts.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// The HTTP server.
pub struct Server {
    listener: TcpListener,
    grace_period: Duration,
    timeouts: Timeouts,
    logger: Dispatch,
}

impl Server {
    /// Binds the listening socket immediately, so an unusable address is
    /// reported before anything is served.
    ///
    /// `addr` is any `host:port` that tokio can resolve; use port `0` to let
    /// the OS pick one and read it back with [`local_addr`](Server::local_addr).
    ///
    /// The server logs through whichever subscriber is current at this point
    /// unless [`logger`](Server::logger) overrides it.
    pub async fn bind(addr: &str) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr: addr.to_owned(), source })?;

        Ok(Self {
            listener,
            grace_period: DEFAULT_GRACE_PERIOD,
            timeouts: Timeouts::default(),
            logger: tracing::dispatcher::get_default(Dispatch::clone),
        })
    }

    /// Logger attached to the accept loop, every connection and every request.
    pub fn logger(mut self, logger: Dispatch) -> Self {
        self.logger = logger;
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Per-connection read, write and idle timeouts.
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves `service` until SIGTERM or Ctrl-C, then drains.
    pub async fn serve<S: Service>(self, service: S) -> Result<(), Error> {
        self.serve_with_shutdown(service, shutdown_signal()).await
    }

    /// Serves `service` until `signal` resolves, then drains.
    ///
    /// Returns after every connection has closed or the grace period has run
    /// out, whichever comes first.
    pub async fn serve_with_shutdown<S, F>(self, service: S, signal: F) -> Result<(), Error>
    where
        S: Service,
        F: Future<Output = ()> + Send,
    {
        let logger = self.logger.clone();
        self.run(Arc::new(service), signal).with_subscriber(logger).await
    }

    async fn run<S, F>(self, service: Arc<S>, signal: F) -> Result<(), Error>
    where
        S: Service,
        F: Future<Output = ()> + Send,
    {
        let Self { listener, grace_period, timeouts, logger } = self;

        let mut tasks = JoinSet::new();

        // Sent once when shutdown starts; every connection task watches it
        // and switches to graceful close.
        let (draining_tx, draining_rx) = watch::channel(false);

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown is checked first so a signal stops accepting even
                // if more connections are queued.
                biased;

                () = &mut signal => {
                    info!(component = "server", in_flight = tasks.len(), "shutting down...");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!(component = "server", "accept error: {e}");
                            continue;
                        }
                    };

                    let conn = serve_connection(
                        stream,
                        remote_addr,
                        timeouts,
                        Arc::clone(&service),
                        logger.clone(),
                        draining_rx.clone(),
                    );
                    tasks.spawn(conn.with_subscriber(logger.clone()));
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        let _ = draining_tx.send(true);

        match tokio::time::timeout(grace_period, drain(&mut tasks)).await {
            Ok(()) => info!(component = "server", "all connections closed"),
            Err(_) => {
                warn!(
                    component = "server",
                    remaining = tasks.len(),
                    grace_period_ms = u64::try_from(grace_period.as_millis()).unwrap_or(u64::MAX),
                    "grace period elapsed, closing remaining connections"
                );
                tasks.shutdown().await;
            }
        }

        Ok(())
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while tasks.join_next().await.is_some() {}
}

/// Drives one connection until the peer closes it or shutdown asks it to.
async fn serve_connection<S: Service>(
    stream: tokio::net::TcpStream,
    remote_addr: SocketAddr,
    timeouts: Timeouts,
    service: Arc<S>,
    logger: Dispatch,
    mut draining: watch::Receiver<bool>,
) {
    let io = TokioIo::new(TimeoutIo::new(stream, timeouts));

    // Called once per request on the connection. Each request future carries
    // the logger itself because HTTP/2 streams run on executor-spawned tasks.
    let svc = service_fn(move |req| {
        let service = Arc::clone(&service);
        handle(service, req, remote_addr).with_subscriber(logger.clone())
    });

    // `auto::Builder` handles both HTTP/1.1 and HTTP/2, whatever the client
    // negotiates. hyper's header timer is off: it would also run while the
    // connection is idle, and `TimeoutIo` covers the head read already.
    let mut builder = ConnBuilder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(None::<Duration>);

    let conn = builder.serve_connection(io, svc);
    tokio::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = draining.changed() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };

    match result {
        Ok(()) => {}
        Err(e) if is_timeout(&*e) => {
            debug!(component = "server", peer = %remote_addr, "connection timed out: {e}");
        }
        Err(e) => error!(component = "server", peer = %remote_addr, "connection error: {e}"),
    }
}

/// True when a [`TimeoutIo`] deadline is anywhere in the error chain.
fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut cur = Some(err);
    while let Some(e) = cur {
        if e.downcast_ref::<io::Error>().is_some_and(|io| io.kind() == io::ErrorKind::TimedOut) {
            return true;
        }
        cur = e.source();
    }
    false
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Core hot path: converts one hyper request and runs it through `service`.
///
/// The error type is [`Infallible`]: every failure is already an HTTP
/// response by the time it gets here.
async fn handle<S: Service>(
    service: Arc<S>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let req = Request::from_http(req, Some(remote_addr));
    Ok(service.call(req).await.into_http())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available. A handler that cannot be installed
/// is logged and its arm never fires.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(component = "server", "failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(component = "server", "failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
