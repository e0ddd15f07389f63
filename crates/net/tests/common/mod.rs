//! Stateful stub registry for download scenarios httpmock cannot express
//!
//! Speaks just enough HTTP/1.1 over a `TcpListener` to serve the `/v2/`
//! probe, a token realm, manifests and blobs with `Range` support. Every
//! response carries `Connection: close`.

#![allow(dead_code)]

use layerpull_hash::Hash;
use layerpull_types::{Digest, DigestAlgorithm};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Knobs for misbehaving registries
#[derive(Debug, Clone, Default)]
pub struct StubBehavior {
    /// Challenge unauthenticated requests with a bearer realm
    pub require_auth: bool,
    /// Answer the first blob request with 401 regardless of credentials
    pub unauthorized_once: bool,
    /// Answer every ranged blob GET with 416
    pub reject_ranges: bool,
    /// Answer this many token requests with 503 before issuing tokens
    pub token_failures: usize,
    /// ETag sent with blob responses
    pub etag: Option<String>,
}

#[derive(Default)]
struct StubState {
    behavior: StubBehavior,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    manifests: Mutex<HashMap<String, (String, Vec<u8>)>>,
    token_requests: AtomicUsize,
    blob_gets: AtomicUsize,
    body_bytes_served: AtomicUsize,
    ranges: Mutex<Vec<String>>,
    unauthorized_sent: AtomicBool,
}

pub struct StubRegistry {
    addr: SocketAddr,
    state: Arc<StubState>,
    _handle: tokio::task::JoinHandle<()>,
}

struct Request {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

impl StubRegistry {
    pub async fn start(behavior: StubBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(StubState {
            behavior,
            ..StubState::default()
        });
        let state_clone = Arc::clone(&state);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let state = Arc::clone(&state_clone);
                tokio::spawn(async move {
                    let _ = serve(stream, addr, &state).await;
                });
            }
        });

        Self {
            addr,
            state,
            _handle: handle,
        }
    }

    /// Registry address with an explicit http scheme
    pub fn registry(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// `host:port`, as it appears in image references
    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    /// Serve `content` as a blob of `repository` and return its digest
    pub fn add_blob(&self, repository: &str, content: Vec<u8>) -> Digest {
        let digest = digest_of(&content);
        self.state
            .blobs
            .lock()
            .unwrap()
            .insert(format!("/v2/{repository}/blobs/{digest}"), content);
        digest
    }

    pub fn add_manifest(&self, repository: &str, reference: &str, media_type: &str, body: String) {
        self.state.manifests.lock().unwrap().insert(
            format!("/v2/{repository}/manifests/{reference}"),
            (media_type.to_string(), body.into_bytes()),
        );
    }

    pub fn token_requests(&self) -> usize {
        self.state.token_requests.load(Ordering::SeqCst)
    }

    pub fn blob_gets(&self) -> usize {
        self.state.blob_gets.load(Ordering::SeqCst)
    }

    pub fn body_bytes_served(&self) -> usize {
        self.state.body_bytes_served.load(Ordering::SeqCst)
    }

    /// `Range` headers seen on blob GETs, in arrival order
    pub fn ranges(&self) -> Vec<String> {
        self.state.ranges.lock().unwrap().clone()
    }
}

pub fn digest_of(content: &[u8]) -> Digest {
    let hash = Hash::from_data(DigestAlgorithm::Sha256, content);
    Digest::new(DigestAlgorithm::Sha256, hash.to_hex()).unwrap()
}

/// Deterministic, non-repeating-looking test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 7) % 251) as u8).collect()
}

async fn serve(mut stream: TcpStream, addr: SocketAddr, state: &StubState) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };
    let reply = route(&request, addr, state);
    let is_head = request.method == "HEAD";

    let mut head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        reply.status,
        reason(reply.status),
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).await?;
    if !is_head {
        stream.write_all(&reply.body).await?;
    }
    stream.flush().await?;
    stream.shutdown().await
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<Option<Request>> {
    let mut raw = Vec::new();
    let mut buffer = [0u8; 1024];
    while !raw.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = stream.read(&mut buffer).await?;
        if read == 0 {
            return Ok(None);
        }
        raw.extend_from_slice(&buffer[..read]);
    }

    let text = String::from_utf8_lossy(&raw);
    let mut lines = text.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let headers = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    Ok(Some(Request {
        method,
        path,
        headers,
    }))
}

fn route(request: &Request, addr: SocketAddr, state: &StubState) -> Reply {
    let behavior = &state.behavior;
    let challenge = || {
        Reply::new(401, b"{}".to_vec()).header(
            "WWW-Authenticate",
            format!(r#"Bearer realm="http://{addr}/token",service="stub-registry""#),
        )
    };
    let authorized = request
        .headers
        .get("authorization")
        .is_some_and(|v| v.starts_with("Bearer token-"));

    if request.path.starts_with("/token") {
        let n = state.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= behavior.token_failures {
            return Reply::new(503, b"token service unavailable".to_vec());
        }
        return Reply::new(
            200,
            format!(r#"{{"token":"token-{n}","expires_in":3600}}"#).into_bytes(),
        )
        .header("Content-Type", "application/json");
    }

    if request.path == "/v2/" {
        return if behavior.require_auth && !authorized {
            challenge()
        } else {
            Reply::new(200, b"{}".to_vec())
        };
    }

    if behavior.require_auth && !authorized {
        return challenge();
    }

    if let Some((media_type, body)) = state.manifests.lock().unwrap().get(&request.path) {
        return Reply::new(200, body.clone()).header("Content-Type", media_type.clone());
    }

    let Some(content) = state.blobs.lock().unwrap().get(&request.path).cloned() else {
        return Reply::new(404, b"not found".to_vec());
    };

    if behavior.unauthorized_once && !state.unauthorized_sent.swap(true, Ordering::SeqCst) {
        return challenge();
    }

    let with_etag = |reply: Reply| match &behavior.etag {
        Some(etag) => reply.header("ETag", etag.clone()),
        None => reply,
    };

    if request.method == "HEAD" {
        return with_etag(Reply::new(200, content));
    }

    state.blob_gets.fetch_add(1, Ordering::SeqCst);
    if let Some(range) = request.headers.get("range") {
        state.ranges.lock().unwrap().push(range.clone());
        if behavior.reject_ranges {
            return Reply::new(416, Vec::new());
        }
        let (start, end) = parse_range(range, content.len());
        let body = content[start..=end].to_vec();
        state
            .body_bytes_served
            .fetch_add(body.len(), Ordering::SeqCst);
        return with_etag(Reply::new(206, body).header(
            "Content-Range",
            format!("bytes {start}-{end}/{}", content.len()),
        ));
    }

    state
        .body_bytes_served
        .fetch_add(content.len(), Ordering::SeqCst);
    with_etag(Reply::new(200, content))
}

fn parse_range(header: &str, len: usize) -> (usize, usize) {
    let spec = header.trim_start_matches("bytes=");
    let (start, end) = spec.split_once('-').unwrap();
    let start = start.parse().unwrap();
    let end = if end.is_empty() {
        len - 1
    } else {
        end.parse::<usize>().unwrap().min(len - 1)
    };
    (start, end)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        401 => "Unauthorized",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}
