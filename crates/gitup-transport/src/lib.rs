//! HTTPS transport for the smart protocol.
//!
//! Issues the discovery `GET` and the fetch `POST` over TLS, hands back the
//! response body with the HTTP framing stripped. The requests are written as
//! literal HTTP/1.1; the response is read to EOF and run through the
//! chunked-transfer reassembler.

pub mod chunked;
pub mod http;

pub use http::HttpsClient;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("TLS error for {host}: {message}")]
    Tls { host: String, message: String },

    #[error("upstream returned HTTP status {status}")]
    UpstreamStatus { status: u16 },

    #[error("malformed HTTP response: {0}")]
    MalformedResponse(String),

    #[error("bad chunk header: {0}")]
    BadChunkHeader(String),

    #[error("truncated chunk: need {expected} more bytes, have {available}")]
    TruncatedChunk { expected: usize, available: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
