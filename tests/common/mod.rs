//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use request_logger::config::LoggerConfig;
use request_logger::sink::{LocalOutput, Stream};
use request_logger::LoggerSettings;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Local output that keeps every line in memory.
#[derive(Default)]
pub struct MemoryOutput {
    lines: Mutex<Vec<(Stream, String)>>,
}

impl LocalOutput for MemoryOutput {
    fn write_line(&self, stream: Stream, line: &str) -> std::io::Result<()> {
        self.lines.lock().push((stream, line.to_string()));
        Ok(())
    }
}

impl MemoryOutput {
    pub fn lines(&self) -> Vec<(Stream, String)> {
        self.lines.lock().clone()
    }

    /// Lines that parse as JSON records.
    pub fn records(&self) -> Vec<Value> {
        self.lines
            .lock()
            .iter()
            .filter_map(|(_, line)| serde_json::from_str(line).ok())
            .collect()
    }
}

/// Settings writing to a fresh in-memory output.
pub fn memory_settings(config: LoggerConfig) -> (Arc<LoggerSettings>, Arc<MemoryOutput>) {
    let output = Arc::new(MemoryOutput::default());
    let settings = LoggerSettings::new(config).with_output(output.clone());
    (Arc::new(settings), output)
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` receives each request body and returns the status and body to send.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let body = read_request_body(&mut socket).await;
                        let (status, body) = f(body).await;
                        let status_text = match status {
                            200 => "200 OK",
                            403 => "403 Forbidden",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request_body(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    String::from_utf8_lossy(&buf[header_end..]).into_owned()
}
