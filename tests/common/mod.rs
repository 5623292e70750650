//! Shared helpers for the integration tests: canned-response Securden
//! stand-ins over plain HTTP and TLS, and self-signed certificates.

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::ssl::{SslAcceptor, SslMethod};
use openssl::x509::{X509NameBuilder, X509};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Set up logging for tests
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// One request as the mock server saw it.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub authtoken: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    #[allow(dead_code)]
    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct MockState {
    routes: HashMap<String, (u16, String)>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// HTTP server answering each path with a fixed status and body.
pub struct MockServer {
    pub url: String,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    /// Starts a server on a free local port. Unknown paths answer 404.
    pub fn start(routes: &[(&str, u16, &str)]) -> Self {
        let routes: HashMap<String, (u16, String)> = routes
            .iter()
            .map(|(path, status, body)| (path.to_string(), (*status, body.to_string())))
            .collect();
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let state = web::Data::new(MockState {
            routes,
            recorded: recorded.clone(),
        });

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let system = actix_rt::System::new();
            system.block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(state.clone())
                        .default_service(web::to(respond))
                })
                .workers(1)
                .bind(("127.0.0.1", 0))
                .unwrap();
                let port = server.addrs()[0].port();
                tx.send(port).unwrap();
                server.run().await.unwrap();
            });
        });

        let port = rx.recv().unwrap();
        Self {
            url: format!("http://127.0.0.1:{}", port),
            recorded,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("no request reached the mock server")
    }
}

async fn respond(req: HttpRequest, body: web::Bytes, state: web::Data<MockState>) -> HttpResponse {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    state.recorded.lock().unwrap().push(RecordedRequest {
        method: req.method().to_string(),
        path: req.path().to_string(),
        query: req.query_string().to_string(),
        authtoken: header("authtoken"),
        content_type: header("content-type"),
        body: String::from_utf8_lossy(&body).to_string(),
    });

    match state.routes.get(req.path()) {
        Some((status, body)) => HttpResponse::build(
            actix_web::http::StatusCode::from_u16(*status).unwrap(),
        )
        .content_type("application/json")
        .body(body.clone()),
        None => HttpResponse::NotFound().body("not found"),
    }
}

/// Self-signed certificate for "localhost".
#[allow(dead_code)]
pub fn self_signed_certificate() -> X509 {
    self_signed_identity().1
}

/// Private key and matching self-signed certificate for "localhost".
#[allow(dead_code)]
pub fn self_signed_identity() -> (PKey<Private>, X509) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "localhost").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    (key, builder.build())
}

/// Writes a fresh self-signed certificate to a temporary PEM file.
#[allow(dead_code)]
pub fn certificate_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".pem").tempfile().unwrap();
    file.write_all(&self_signed_certificate().to_pem().unwrap())
        .unwrap();
    file.flush().unwrap();
    file
}

/// HTTPS server answering every request with `200` and a fixed JSON body.
///
/// Connections that never send a request (certificate fetches, aborted
/// handshakes) are dropped and the server keeps accepting.
#[allow(dead_code)]
pub struct TlsMockServer {
    pub url: String,
    pub certificate: X509,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

#[allow(dead_code)]
impl TlsMockServer {
    pub fn start(body: &str) -> Self {
        let (key, certificate) = self_signed_identity();
        let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
        acceptor.set_private_key(&key).unwrap();
        acceptor.set_certificate(&certificate).unwrap();
        acceptor.check_private_key().unwrap();
        let acceptor = acceptor.build();

        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let seen = recorded.clone();
        let body = body.to_string();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
                let Ok(mut tls) = acceptor.accept(stream) else {
                    continue;
                };
                let Some(request) = read_request(&mut tls) else {
                    continue;
                };
                seen.lock().unwrap().push(request);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = tls.write_all(response.as_bytes());
                let _ = tls.flush();
                let _ = tls.shutdown();
            }
        });

        Self {
            url: format!("https://127.0.0.1:{}", port),
            certificate,
            recorded,
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    /// Writes the server's own certificate to a temporary PEM file.
    pub fn certificate_file(&self) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".pem").tempfile().unwrap();
        file.write_all(&self.certificate.to_pem().unwrap()).unwrap();
        file.flush().unwrap();
        file
    }
}

/// Reads one HTTP/1.1 request. `None` when the peer sent nothing usable.
fn read_request(stream: &mut impl Read) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?;
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(RecordedRequest {
        method,
        path: path.to_string(),
        query: query.to_string(),
        authtoken: headers.get("authtoken").cloned(),
        content_type: headers.get("content-type").cloned(),
        body: String::from_utf8_lossy(&body).to_string(),
    })
}
