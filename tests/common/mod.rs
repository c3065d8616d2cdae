//! Shared helpers for integration tests: a log capture and a running server.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log_service::{Error, Server, Service, Timeouts};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory sink for JSON log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// A JSON logger at TRACE writing into this capture. Event fields are
    /// flattened next to `level` and `message`.
    pub fn logger(&self) -> Dispatch {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_max_level(tracing::Level::TRACE)
            .with_writer(self.clone())
            .finish();
        Dispatch::new(subscriber)
    }

    pub fn records(&self) -> Vec<Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Records carrying `request_id == id`, in emission order.
    pub fn for_request(&self, id: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r["request_id"] == id)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A server running on `127.0.0.1:<random>` in a background task.
pub struct TestServer {
    pub addr: SocketAddr,
    pub logs: LogCapture,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), Error>>,
}

impl TestServer {
    pub async fn start<S: Service>(service: S) -> Self {
        Self::start_with_grace(service, log_service::DEFAULT_GRACE_PERIOD).await
    }

    pub async fn start_with_grace<S: Service>(service: S, grace: Duration) -> Self {
        Self::start_with(service, |server| server.grace_period(grace)).await
    }

    pub async fn start_with_timeouts<S: Service>(service: S, timeouts: Timeouts) -> Self {
        Self::start_with(service, |server| server.timeouts(timeouts)).await
    }

    /// Binds a server, lets `configure` adjust it, and starts serving.
    pub async fn start_with<S, F>(service: S, configure: F) -> Self
    where
        S: Service,
        F: FnOnce(Server) -> Server,
    {
        let logs = LogCapture::default();
        let server = Server::bind("127.0.0.1:0").await.unwrap().logger(logs.logger());
        let server = configure(server);
        let addr = server.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_with_shutdown(service, async move {
            let _ = rx.await;
        }));

        Self { addr, logs, shutdown: Some(tx), handle }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Sends the shutdown signal without waiting.
    pub fn trigger_shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Signals shutdown and waits for `serve_with_shutdown` to return.
    pub async fn stop(mut self) -> Result<(), Error> {
        self.trigger_shutdown();
        self.handle.await.unwrap()
    }

    pub async fn join(self) -> Result<(), Error> {
        self.handle.await.unwrap()
    }
}

pub fn is_generated_id(s: &str) -> bool {
    s.len() == 16 && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'))
}
