//! # tcphttp
//!
//! An incremental, from-scratch HTTP/1.1 request parser and a small Tokio
//! server that answers one request per TCP connection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tcphttp::server::{HandlerError, Server};
//! use tcphttp::http::{Request, Response, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:42069").await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run(|req: Request| async move {
//!         match req.target() {
//!             "/myproblem" => Err(HandlerError::new(
//!                 StatusCode::InternalServerError,
//!                 "Woopsie, my bad\n",
//!             )),
//!             _ => Ok(Response::new(StatusCode::Ok).body("All good\n")),
//!         }
//!     }).await?;
//!     Ok(())
//! }
//! ```
//!
//! The parser can also be used on its own, over any [`tokio::io::AsyncRead`]:
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use tcphttp::Request;
//!
//! let raw: &[u8] = b"GET /x HTTP/1.1\r\nAccept: t1\r\nAccept: t2\r\n\r\n";
//! let request = Request::from_reader(raw).await.unwrap();
//! assert_eq!(request.headers().get("accept"), Some("t1,t2"));
//! # }
//! ```

pub mod http;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, ParseError, Request, Response, StatusCode, Version};
pub use server::{HandlerError, Server, ServerError, ShutdownHandle};
