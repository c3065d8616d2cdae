//! `log-service` binary.
//!
//! Run with:
//!   LOG_LEVEL=debug ADDR=:8080 cargo run
//!
//! Try:
//!   curl http://localhost:8080/
//!   curl -H 'X-Request-ID: abc123' 'http://localhost:8080/work?task=fail-now'
//!   curl http://localhost:8080/healthz

use std::process::ExitCode;

use log_service::{Config, Server, app, telemetry};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    let logger = telemetry::logger(config.log_level);

    run(config, logger.clone()).with_subscriber(logger).await
}

async fn run(config: Config, logger: Dispatch) -> ExitCode {
    info!(component = "server", addr = %config.addr, "starting http server");

    let server = match Server::bind(&config.bind_addr()).await {
        Ok(server) => server.logger(logger),
        Err(e) => {
            error!(component = "server", error = %e, "server error");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.serve(app()).await {
        error!(component = "server", error = %e, "server error");
        return ExitCode::FAILURE;
    }

    info!(component = "server", "bye");
    ExitCode::SUCCESS
}
