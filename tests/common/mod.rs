#![allow(dead_code)]

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use rcgen::{CertificateParams, KeyPair};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use tracing_log_ingest::sink::IngestSink;
use tracing_log_ingest::Status;

/// Sink that records every document and answers with a fixed status.
pub struct RecordingSink {
    pub documents: Mutex<Vec<String>>,
    status: Status,
}

impl RecordingSink {
    pub fn new(status: Status) -> Arc<Self> {
        Arc::new(RecordingSink {
            documents: Mutex::new(Vec::new()),
            status,
        })
    }

    pub fn calls(&self) -> usize {
        self.documents.lock().len()
    }

    pub fn last(&self) -> Option<String> {
        self.documents.lock().last().cloned()
    }
}

impl IngestSink for RecordingSink {
    fn send(&self, document: &str) -> Status {
        self.documents.lock().push(document.to_string());
        self.status
    }
}

/// Start an HTTPS endpoint with a freshly generated self-signed certificate
/// that answers every request with `204 No Content`.
pub fn spawn_self_signed_server() -> SocketAddr {
    let key_pair = KeyPair::generate().expect("generate key pair");
    let params = CertificateParams::new(vec!["localhost".to_string(), "127.0.0.1".to_string()])
        .expect("certificate params");
    let certificate = params.self_signed(&key_pair).expect("self-signed certificate");

    let cert_der = CertificateDer::from(certificate.der().to_vec());
    let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("protocol versions")
        .with_no_client_auth()
        .with_single_cert(vec![cert_der], key_der)
        .expect("server certificate");
    let config = Arc::new(config);

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind TLS listener");
    let addr = listener.local_addr().expect("local addr");

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { continue };
            let config = Arc::clone(&config);
            thread::spawn(move || {
                let Ok(connection) = ServerConnection::new(config) else {
                    return;
                };
                let mut tls = StreamOwned::new(connection, stream);
                // Handshake failures from validating clients end up here.
                let _ = answer_no_content(&mut tls);
            });
        }
    });

    addr
}

fn answer_no_content<S: Read + Write>(stream: &mut S) -> io::Result<()> {
    let mut reader = BufReader::new(&mut *stream);
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;
    drop(reader);

    stream.write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n")?;
    stream.flush()
}
