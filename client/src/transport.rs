//! XML-RPC over HTTP(S).
//!
//! Calls are posted as `text/xml` through a [`ureq::Agent`] that keeps no
//! idle connections, so every call opens its own. Server
//! certificates are not verified: n4d daemons run with self-signed
//! certificates.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use n4d_common::{
    xmlrpc::{self, MethodResponse},
    ServerAddress, Value,
};
use tracing::debug;
use ureq::{tls::TlsConfig, Agent, Error as UreqError};

/// Default timeout for a whole call, connect to last byte
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Replies larger than this are refused
const MAX_RESPONSE_SIZE: u64 = 16 * 1024 * 1024;

/// Something that can carry one XML-RPC call to a server and bring back the
/// decoded reply value
pub trait Transport: Send + Sync {
    fn call(&self, address: &str, method: &str, params: &[Value]) -> Result<Value>;
}

/// XML-RPC transport over HTTPS without server certificate verification.
/// Plain `http://` addresses are accepted too.
pub struct TlsTransport {
    agent: Agent,
}

impl TlsTransport {
    pub fn new(timeout: Duration) -> Self {
        let tls_config = TlsConfig::builder().disable_verification(true).build();

        let agent = Agent::config_builder()
            .proxy(None)
            .timeout_global(Some(timeout))
            // one connection per call, nothing is kept for reuse
            .max_idle_connections(0)
            .max_idle_connections_per_host(0)
            .tls_config(tls_config)
            .user_agent(concat!("n4d-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .new_agent();

        Self { agent }
    }

    fn post(&self, address: &ServerAddress, body: &[u8]) -> Result<Vec<u8>> {
        let mut response = self
            .agent
            .post(address.to_string())
            .content_type("text/xml")
            .send(body)
            .map_err(|err| match err {
                UreqError::StatusCode(code) => anyhow!("HTTP error {code} from {address}"),
                other => anyhow::Error::new(other).context(format!("Failed to reach {address}")),
            })?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_SIZE)
            .read_to_vec()
            .context("Failed to read response")
    }
}

impl Default for TlsTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport for TlsTransport {
    fn call(&self, address: &str, method: &str, params: &[Value]) -> Result<Value> {
        let server: ServerAddress = address
            .parse()
            .with_context(|| format!("Invalid server address {address}"))?;

        let body = xmlrpc::encode_call(method, params)?;
        debug!("POST {} {} ({} bytes)", server, method, body.len());
        let response = self.post(&server, &body)?;

        match xmlrpc::decode_response(&response)? {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault { code, message } => Err(anyhow!("<Fault {code}: {message}>")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{BufRead, BufReader, Read, Write},
        net::TcpListener,
        sync::{mpsc, Arc},
        thread,
        time::Instant,
    };

    use super::*;

    const REPLY: &str = "<?xml version='1.0'?><methodResponse><params><param><value><struct>\
        <member><name>status</name><value><int>0</int></value></member>\
        <member><name>msg</name><value><string>ok</string></value></member>\
        <member><name>return</name><value><string>2.0</string></value></member>\
        </struct></value></param></params></methodResponse>";

    /// Reads one HTTP request and returns its body
    fn read_request<R: BufRead>(reader: &mut R) -> String {
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap();
                }
            }
        }

        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();
        String::from_utf8(body).unwrap()
    }

    fn write_reply<W: Write>(stream: &mut W, status_line: &str, body: &str) {
        write!(
            stream,
            "{status_line}\r\nContent-Type: text/xml\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
        .unwrap();
        stream.flush().unwrap();
    }

    fn self_signed_config() -> Arc<rustls::ServerConfig> {
        let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
        let key = rustls::pki_types::PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let config = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::aws_lc_rs::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.cert.der().clone()], key.into())
        .unwrap();

        Arc::new(config)
    }

    #[test]
    fn test_plain_http_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let request = read_request(&mut reader);
            write_reply(reader.get_mut(), "HTTP/1.0 200 OK", REPLY);
            request
        });

        let transport = TlsTransport::new(Duration::from_secs(5));
        let reply = transport
            .call(&format!("http://127.0.0.1:{port}"), "version", &[])
            .unwrap();

        assert_eq!(reply.get("return"), Some(&Value::from("2.0")));
        let request = server.join().unwrap();
        assert!(request.contains("<methodName>version</methodName>"));
    }

    #[test]
    fn test_self_signed_https_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let config = self_signed_config();

        let server = thread::spawn(move || {
            let (socket, _) = listener.accept().unwrap();
            let connection = rustls::ServerConnection::new(config).unwrap();
            let mut reader = BufReader::new(rustls::StreamOwned::new(connection, socket));

            let request = read_request(&mut reader);
            let stream = reader.get_mut();
            write_reply(stream, "HTTP/1.1 200 OK", REPLY);
            stream.conn.send_close_notify();
            // the client may already have hung up
            let _ = stream.flush();
            request
        });

        let transport = TlsTransport::new(Duration::from_secs(5));
        let reply = transport
            .call(
                &format!("https://127.0.0.1:{port}"),
                "get_variable",
                &[Value::from("x")],
            )
            .unwrap();

        assert_eq!(reply.get("status"), Some(&Value::from(0)));
        let request = server.join().unwrap();
        assert!(request.contains("<methodName>get_variable</methodName>"));
    }

    #[test]
    fn test_reply_on_open_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            read_request(&mut reader);
            write_reply(reader.get_mut(), "HTTP/1.1 200 OK", REPLY);
            // hold the connection open until the client is done
            let _ = done_rx.recv_timeout(Duration::from_secs(10));
        });

        let transport = TlsTransport::new(Duration::from_secs(5));
        let started = Instant::now();
        let reply = transport.call(&format!("http://127.0.0.1:{port}"), "version", &[]);
        let elapsed = started.elapsed();
        done_tx.send(()).unwrap();
        server.join().unwrap();

        assert_eq!(reply.unwrap().get("return"), Some(&Value::from("2.0")));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_http_error_status() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            read_request(&mut reader);
            write_reply(reader.get_mut(), "HTTP/1.0 500 Internal Server Error", "");
        });

        let transport = TlsTransport::new(Duration::from_secs(5));
        let error = transport
            .call(&format!("http://127.0.0.1:{port}"), "version", &[])
            .unwrap_err();
        server.join().unwrap();

        assert!(error.to_string().contains("HTTP error 500"));
    }

    #[test]
    fn test_fault_is_an_error() {
        let fault = "<?xml version='1.0'?><methodResponse><fault><value><struct>\
            <member><name>faultCode</name><value><int>1</int></value></member>\
            <member><name>faultString</name><value><string>nope</string></value></member>\
            </struct></value></fault></methodResponse>";

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            read_request(&mut reader);
            write_reply(reader.get_mut(), "HTTP/1.0 200 OK", fault);
        });

        let transport = TlsTransport::new(Duration::from_secs(5));
        let error = transport
            .call(&format!("http://127.0.0.1:{port}"), "version", &[])
            .unwrap_err();
        server.join().unwrap();

        assert_eq!(error.to_string(), "<Fault 1: nope>");
    }

    #[test]
    fn test_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = TlsTransport::new(Duration::from_secs(1));
        assert!(transport
            .call(&format!("https://127.0.0.1:{port}"), "version", &[])
            .is_err());
    }

    #[test]
    fn test_invalid_address() {
        let transport = TlsTransport::default();
        assert!(transport.call("not an address", "version", &[]).is_err());
    }
}
