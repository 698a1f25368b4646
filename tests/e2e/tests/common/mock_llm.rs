//! Minimal stand-in for the remote extraction/arbitration endpoint. Answers
//! every request with the next scripted chat-completion body, cycling back
//! to the start once the script is exhausted — just enough of HTTP/1.1 for
//! `reqwest` to parse a response, nothing resembling a real LLM.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub struct MockLlm {
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl MockLlm {
    pub async fn start(responses: Vec<&str>) -> Self {
        let responses: Vec<String> = responses.into_iter().map(str::to_string).collect();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock llm listener");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let script = Arc::new(Mutex::new((responses, 0usize)));

        let handle = tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(_) => break,
                };
                let script = script.clone();
                tokio::spawn(handle_connection(socket, script));
            }
        });

        Self { base_url, handle }
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(mut socket: tokio::net::TcpStream, script: Arc<Mutex<(Vec<String>, usize)>>) {
    if read_request(&mut socket).await.is_none() {
        return;
    }

    let content = {
        let mut guard = script.lock().await;
        if guard.0.is_empty() {
            String::new()
        } else {
            let idx = guard.1 % guard.0.len();
            guard.1 += 1;
            guard.0[idx].clone()
        }
    };

    let payload = serde_json::json!({ "choices": [{ "message": { "content": content } }] });
    let body = payload.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Reads headers then drains the declared `Content-Length` body. We never
/// inspect the request payload, only wait for it to be fully sent before
/// replying, so `reqwest` doesn't see a short-circuited connection.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_double_crlf(&buf) {
            break pos;
        }
        if buf.len() > 1 << 20 {
            return None;
        }
    };

    let header_text = String::from_utf8_lossy(&buf[..header_end]);
    let content_length: usize = header_text
        .lines()
        .find_map(|line| line.to_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_string()))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut have = buf.len() - (header_end + 4);
    while have < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        have += n;
    }
    Some(())
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
