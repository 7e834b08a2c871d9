//! Literal HTTP/1.1 over TLS.
//!
//! One connection per request: connect, send the request text, read the
//! response to EOF, decode the body. The server certificate is validated
//! against the platform trust store.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use native_tls::TlsConnector;

use crate::{chunked, TransportError};

/// Version string advertised in the User-Agent header.
const GIT_VERSION: &str = "2.28";

/// Socket read/write timeout.
const IO_TIMEOUT: Duration = Duration::from_secs(300);

/// Quantum by which the response buffer grows.
const RESPONSE_BLOCK: usize = 1 << 20;

/// A client for one remote host.
pub struct HttpsClient {
    host: String,
    port: u16,
}

impl HttpsClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Issue the discovery request and return the decoded body.
    pub fn get(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let request = format!(
            "GET {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             User-Agent: git/{GIT_VERSION}\r\n\
             Connection: close\r\n\
             \r\n",
            host = self.host,
        );
        let raw = self.exchange(request.as_bytes(), &[])?;
        chunked::decode(&raw)
    }

    /// Issue the fetch request and return the decoded body.
    pub fn post(
        &self,
        path: &str,
        content_type: &str,
        accept: &str,
        body: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        let request = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             User-Agent: git/{GIT_VERSION}\r\n\
             Content-Type: {content_type}\r\n\
             Accept: {accept}\r\n\
             Git-Protocol: version=2\r\n\
             Content-Length: {len}\r\n\
             Connection: close\r\n\
             \r\n",
            host = self.host,
            len = body.len(),
        );
        let raw = self.exchange(request.as_bytes(), body)?;
        chunked::decode(&raw)
    }

    /// Send one request and read the raw response to EOF.
    fn exchange(&self, head: &[u8], body: &[u8]) -> Result<Vec<u8>, TransportError> {
        let stream =
            TcpStream::connect((self.host.as_str(), self.port)).map_err(|source| {
                TransportError::Connect {
                    host: self.host.clone(),
                    port: self.port,
                    source,
                }
            })?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let connector = TlsConnector::new().map_err(|e| TransportError::Tls {
            host: self.host.clone(),
            message: e.to_string(),
        })?;
        let mut tls = connector
            .connect(&self.host, stream)
            .map_err(|e| TransportError::Tls {
                host: self.host.clone(),
                message: e.to_string(),
            })?;

        tls.write_all(head)?;
        tls.write_all(body)?;
        tls.flush()?;

        let mut response: Vec<u8> = Vec::with_capacity(RESPONSE_BLOCK);
        let mut buf = [0u8; 4096];
        loop {
            match tls.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if response.len() + n > response.capacity() {
                        response.reserve(RESPONSE_BLOCK);
                    }
                    response.extend_from_slice(&buf[..n]);
                }
                // Servers that drop the connection without a TLS close_notify
                // still mark the end of a Connection: close response.
                Err(e)
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::UnexpectedEof
                            | std::io::ErrorKind::ConnectionAborted
                            | std::io::ErrorKind::ConnectionReset
                    ) =>
                {
                    break
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }

        Ok(response)
    }
}
