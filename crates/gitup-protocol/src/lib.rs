//! Client-side wire protocol for the v2 smart-HTTP fetch.
//!
//! Handles pkt-line framing, the ref advertisement returned by the discovery
//! request, construction of the v2 `fetch` command body, and extraction of
//! the sideband-multiplexed pack data from the fetch response.

pub mod advertisement;
pub mod pktline;
pub mod request;
pub mod response;

/// Errors that can occur during protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid pkt-line: {0}")]
    InvalidPktLine(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("branch {0} is not advertised by the remote")]
    BranchNotFound(String),

    #[error("remote did not advertise an agent capability")]
    MissingAgent,

    #[error(transparent)]
    Hash(#[from] gitup_hash::HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
