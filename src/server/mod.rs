//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and answers exactly one HTTP/1.1 request on each.
//! Every connection gets its own task; tasks share nothing but the handler.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::http::{ParseError, Request, Response, StatusCode};

/// Port the bundled demos listen on when none is configured.
pub const DEFAULT_PORT: u16 = 42069;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// A failure reported by a request handler, sent to the client as-is.
///
/// ```
/// use tcphttp::http::StatusCode;
/// use tcphttp::server::HandlerError;
///
/// let err = HandlerError::new(StatusCode::BadRequest, "Your problem is not my problem\n");
/// let response = err.into_response();
/// assert_eq!(response.status(), StatusCode::BadRequest);
/// ```
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HandlerError {
    pub status: StatusCode,
    pub message: String,
}

impl HandlerError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Builds the response carrying this error's status and message.
    pub fn into_response(self) -> Response {
        Response::new(self.status).body(self.message)
    }
}

impl From<HandlerError> for Response {
    fn from(err: HandlerError) -> Self {
        err.into_response()
    }
}

/// Stops a running [`Server`] from accepting further connections.
///
/// Cheap to clone; all clones control the same server. Connections already
/// accepted are left to finish on their own.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    closed: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Marks the server closed and wakes its accept loop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// The HTTP server.
///
/// Binds to a TCP address and dispatches each incoming request to a handler
/// function.
///
/// # Examples
///
/// ```rust,no_run
/// use tcphttp::server::Server;
/// use tcphttp::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:42069").await?;
///     let shutdown = server.shutdown_handle();
///     tokio::spawn(async move {
///         let _ = tokio::signal::ctrl_c().await;
///         shutdown.close();
///     });
///     server.run(|_req: Request| async {
///         Ok(Response::new(StatusCode::Ok).body("Hello!"))
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            shutdown: ShutdownHandle::default(),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a handle that stops [`run`](Self::run) from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accepts connections and dispatches requests to `handler` until closed.
    ///
    /// The handler receives the parsed [`Request`] and resolves to either a
    /// [`Response`] or a [`HandlerError`]. It is wrapped in an [`Arc`] and
    /// shared across all spawned Tokio tasks, so it must be
    /// `Send + Sync + 'static`.
    ///
    /// Returns once [`ShutdownHandle::close`] is called; the listening socket
    /// is dropped on return. Accept errors while open are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `Ok` on close; accept failures are skipped, not returned.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "server listening");

        while !self.shutdown.is_closed() {
            let accepted = tokio::select! {
                res = self.listener.accept() => res,
                () = self.shutdown.notify.notified() => break,
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    if self.shutdown.is_closed() {
                        break;
                    }
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }

        info!(address = %self.local_addr, "server closed, shutting down listener");
        Ok(())
    }
}

/// Reads one request from `stream`, answers it, and closes the connection.
///
/// Malformed or truncated requests are answered with `400 Bad Request`; a
/// failed read drops the connection without a response.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Response, HandlerError>> + Send + 'static,
{
    let response = match Request::from_reader(&mut stream).await {
        Ok(request) => {
            debug!(
                peer = %peer_addr,
                method = %request.method(),
                target = request.target(),
                "dispatching request"
            );
            handler(request).await.unwrap_or_else(|e| {
                debug!(peer = %peer_addr, error = %e, "handler returned an error");
                e.into_response()
            })
        }
        Err(ParseError::Io(e)) => return Err(e),
        Err(e) => {
            warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
            Response::new(StatusCode::BadRequest).body(format!("{e}\n"))
        }
    };

    response.write_to(&mut stream).await?;
    stream.shutdown().await
}
