//! Demo HTTP server.
//!
//! ```text
//! cargo run --example httpserver -- 42069
//! curl -i http://localhost:42069/yourproblem
//! ```
//!
//! The port comes from the first argument, then `PORT`, then
//! [`DEFAULT_PORT`]. Log verbosity follows `RUST_LOG` (default `info`).

use tcphttp::http::{Request, Response, StatusCode};
use tcphttp::server::{DEFAULT_PORT, HandlerError, Server, ShutdownHandle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn port_from_env() -> u16 {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|raw| match raw.parse() {
            Ok(port) => Some(port),
            Err(e) => {
                warn!(value = %raw, error = %e, "ignoring invalid port");
                None
            }
        })
        .unwrap_or(DEFAULT_PORT)
}

async fn app(req: Request) -> Result<Response, HandlerError> {
    match req.target() {
        "/yourproblem" => Err(HandlerError::new(
            StatusCode::BadRequest,
            "Your problem is not my problem\n",
        )),
        "/myproblem" => Err(HandlerError::new(
            StatusCode::InternalServerError,
            "Woopsie, my bad\n",
        )),
        _ => Ok(Response::new(StatusCode::Ok).body("All good, frfr\n")),
    }
}

async fn close_on_signal(shutdown: ShutdownHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("server graceful shutdown");
    shutdown.close();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = Server::bind(format!("0.0.0.0:{}", port_from_env())).await?;
    info!(address = %server.local_addr(), "server started");

    tokio::spawn(close_on_signal(server.shutdown_handle()));
    server.run(app).await?;
    Ok(())
}
