use std::net::SocketAddr;
use std::time::Duration;

use tcphttp::http::{Request, Response, StatusCode};
use tcphttp::server::{HandlerError, Server, ShutdownHandle};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

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
        "/echo" => Ok(Response::new(StatusCode::Ok).body_bytes(req.body().to_vec())),
        _ => Ok(Response::new(StatusCode::Ok).body("All good, frfr\n")),
    }
}

async fn start() -> (SocketAddr, ShutdownHandle, JoinHandle<()>) {
    let server = Server::bind("127.0.0.1:0").await.unwrap();
    let addr = server.local_addr();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(async move {
        server.run(app).await.unwrap();
    });
    (addr, shutdown, task)
}

async fn roundtrip(addr: SocketAddr, chunks: &[&[u8]]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    for chunk in chunks {
        stream.write_all(chunk).await.unwrap();
        stream.flush().await.unwrap();
    }
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn ok_response() {
    let (addr, shutdown, _task) = start().await;
    let res = roundtrip(addr, &[b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n"]).await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(res.contains("Content-Length: 15\r\n"));
    assert!(res.contains("Connection: close\r\n"));
    assert!(res.contains("Content-Type: text/plain\r\n"));
    assert!(res.ends_with("\r\n\r\nAll good, frfr\n"));
    shutdown.close();
}

#[tokio::test]
async fn handler_errors_map_to_status() {
    let (addr, shutdown, _task) = start().await;

    let res = roundtrip(addr, &[b"GET /yourproblem HTTP/1.1\r\n\r\n"]).await;
    assert!(res.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(res.ends_with("Your problem is not my problem\n"));

    let res = roundtrip(addr, &[b"GET /myproblem HTTP/1.1\r\n\r\n"]).await;
    assert!(res.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(res.ends_with("Woopsie, my bad\n"));

    shutdown.close();
}

#[tokio::test]
async fn fragmented_request_with_body() {
    let (addr, shutdown, _task) = start().await;
    let res = roundtrip(
        addr,
        &[
            b"POST /ec",
            b"ho HTTP/1.1\r\nContent-",
            b"Length: 11\r\n",
            b"\r\nhello",
            b" world",
        ],
    )
    .await;
    assert!(res.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(res.contains("Content-Length: 11\r\n"));
    assert!(res.ends_with("\r\n\r\nhello world"));
    shutdown.close();
}

#[tokio::test]
async fn malformed_request_gets_400() {
    let (addr, shutdown, _task) = start().await;
    let res = roundtrip(addr, &[b"get / HTTP/1.1\r\n\r\n"]).await;
    assert!(res.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(res.contains("invalid method 'get'"));
    shutdown.close();
}

#[tokio::test]
async fn truncated_request_gets_400() {
    let (addr, shutdown, _task) = start().await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 20\r\n\r\nshort")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let mut out = String::new();
    stream.read_to_string(&mut out).await.unwrap();
    assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(out.contains("incomplete request"));

    shutdown.close();
}

#[tokio::test]
async fn close_stops_accept_loop() {
    let (addr, shutdown, task) = start().await;

    // An in-flight connection still gets its answer after close.
    let mut pending = TcpStream::connect(addr).await.unwrap();
    pending.write_all(b"GET / HT").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.close();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("accept loop did not exit")
        .unwrap();

    pending.write_all(b"TP/1.1\r\n\r\n").await.unwrap();
    let mut out = String::new();
    pending.read_to_string(&mut out).await.unwrap();
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));

    assert!(TcpStream::connect(addr).await.is_err());
}
