//! Shared utilities for integration tests.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::{write::GzEncoder, Compression};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use marker_proxy::config::ProxyConfig;
use marker_proxy::net::Listener;
use marker_proxy::{ProxyServer, Shutdown};

/// Request heads seen by a mock backend.
pub type Seen = Arc<Mutex<Vec<String>>>;

/// Start a mock backend that records each request head and answers with the
/// given raw response.
pub async fn start_mock_backend(addr: SocketAddr, response: Vec<u8>) -> Seen {
    let listener = TcpListener::bind(addr).await.unwrap();
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();
    let response = Arc::new(response);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let recorded = recorded.clone();
                    let response = response.clone();
                    tokio::spawn(async move {
                        let (read_half, mut write_half) = socket.into_split();
                        let mut reader = BufReader::new(read_half);
                        let mut head = String::new();
                        loop {
                            let mut line = String::new();
                            match reader.read_line(&mut line).await {
                                Ok(0) | Err(_) => break,
                                Ok(_) => {
                                    head.push_str(&line);
                                    if line == "\r\n" {
                                        break;
                                    }
                                }
                            }
                        }
                        recorded.lock().unwrap().push(head);
                        let _ = write_half.write_all(&response).await;
                        let _ = write_half.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    seen
}

/// Raw HTTP/1.1 response with a fixed Content-Length.
pub fn fixed_response(content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        content_type,
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// Raw HTTP/1.1 response with a gzip-encoded body.
pub fn gzip_response(content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        content_type,
        compressed.len()
    )
    .into_bytes();
    response.extend_from_slice(&compressed);
    response
}

/// Raw HTTP/1.1 response sent with chunked transfer encoding.
pub fn chunked_response(content_type: &str, chunks: &[&str]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        content_type
    );
    for chunk in chunks {
        response.push_str(&format!("{:x}\r\n{}\r\n", chunk.len(), chunk));
    }
    response.push_str("0\r\n\r\n");
    response.into_bytes()
}

/// Proxy config listening on `proxy_addr` and forwarding to `upstream`.
pub fn proxy_config(proxy_addr: SocketAddr, upstream: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.host = proxy_addr.ip().to_string();
    config.listener.port = proxy_addr.port();
    config.upstream.base_url = upstream.to_string();
    config.upstream.use_system_proxy = false;
    config.upstream.timeout_secs = Some(5);
    config
}

/// Bind and run a proxy in the background.
pub async fn start_proxy(config: ProxyConfig) -> (Shutdown, JoinHandle<std::io::Result<()>>) {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let server = ProxyServer::new(config).unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, signal).await });
    (shutdown, handle)
}

/// Send a raw request and read the reply until the proxy closes the socket.
pub async fn send_raw(proxy_addr: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy_addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut reply = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut reply))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    reply
}

/// Split a reply into its head text and body bytes.
pub fn split_reply(reply: &[u8]) -> (String, Vec<u8>) {
    let end = reply
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("reply has no header terminator");
    (
        String::from_utf8(reply[..end + 4].to_vec()).unwrap(),
        reply[end + 4..].to_vec(),
    )
}
