//! Accepts TCP connections and prints each parsed request to stdout.
//!
//! ```text
//! cargo run --example tcplistener
//! printf 'GET / HTTP/1.1\r\nHost: x\r\n\r\n' | nc localhost 42069
//! ```

use tcphttp::Request;
use tcphttp::server::DEFAULT_PORT;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn render(request: &Request) -> String {
    let mut out = String::from("Request line:\n");
    out.push_str(&format!("- Method: {}\n", request.method()));
    out.push_str(&format!("- Target: {}\n", request.target()));
    out.push_str(&format!("- Version: {}\n", request.version()));
    out.push_str("Headers:\n");
    for (name, value) in request.headers().iter() {
        out.push_str(&format!("- {name}: {value}\n"));
    }
    out.push_str("Body:\n");
    out.push_str(&String::from_utf8_lossy(request.body()));
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let listener = TcpListener::bind(("0.0.0.0", DEFAULT_PORT)).await?;
    info!(address = %listener.local_addr()?, "listening for raw TCP connections");

    loop {
        let (stream, peer) = listener.accept().await?;
        info!(peer = %peer, "connection accepted");

        tokio::spawn(async move {
            match Request::from_reader(stream).await {
                Ok(request) => println!("{}", render(&request)),
                Err(e) => warn!(peer = %peer, error = %e, "could not parse request"),
            }
            info!(peer = %peer, "connection closed");
        });
    }
}
