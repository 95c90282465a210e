//! Error types for the Bitcoin RPC client.

use std::{fmt, io};

use corepc_types::bitcoin::hex::HexToArrayError;
use jsonrpc::error::RpcError;
use jsonrpc::serde_json;

/// Result type alias for the RPC client.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when using the Bitcoin RPC client.
#[derive(Debug)]
pub enum Error {
    /// Missing authentication credentials.
    MissingAuthentication,

    /// Invalid or corrupted cookie file.
    InvalidCookieFile,

    /// The request could not be built, sent, or its body fully read.
    Transport(TransportError),

    /// The response body is not valid JSON or does not match the expected shape.
    Decode {
        /// Raw response body, lossily converted to UTF-8.
        body: String,
        source: serde_json::Error,
    },

    /// A caller-supplied argument was rejected before any network call.
    InvalidArgument(String),

    /// The node answered, but with an empty value for the named method.
    EmptyResult(&'static str),

    /// JSON-RPC error reported by the node (only with `RpcErrorPolicy::Surface`).
    Rpc(RpcError),

    /// Hash parsing error.
    HexToArray(HexToArrayError),

    /// I/O error (e.g., reading cookie file).
    Io(io::Error),
}

/// Failures below the JSON-RPC layer.
#[derive(Debug)]
pub enum TransportError {
    /// The request envelope could not be serialized.
    Encode(serde_json::Error),

    /// The HTTP exchange failed.
    Http(minreq::Error),

    /// I/O failure reported by a custom transport.
    Io(io::Error),
}

impl Error {
    pub(crate) fn decode(body: &[u8], source: serde_json::Error) -> Self {
        Error::Decode {
            body: String::from_utf8_lossy(body).into_owned(),
            source,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MissingAuthentication => {
                write!(f, "authentication is required but none was provided")
            }
            Error::InvalidCookieFile => write!(f, "invalid cookie file"),
            Error::Transport(e) => write!(f, "transport error: {e}"),
            Error::Decode { body, source } => {
                write!(f, "failed to decode response: {source}; body={body}")
            }
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Error::EmptyResult(method) => write!(f, "empty result from `{method}`"),
            Error::Rpc(e) => write!(f, "JSON-RPC error {}: {}", e.code, e.message),
            Error::HexToArray(e) => write!(f, "Hash parsing error: {e}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransportError::Encode(e) => write!(f, "failed to encode request: {e}"),
            TransportError::Http(e) => write!(f, "HTTP error: {e}"),
            TransportError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(e) => Some(e),
            Error::Decode { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            Error::HexToArray(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Encode(e) => Some(e),
            TransportError::Http(e) => Some(e),
            TransportError::Io(e) => Some(e),
        }
    }
}

// Conversions from other error types
impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Error::Transport(e)
    }
}

impl From<minreq::Error> for TransportError {
    fn from(e: minreq::Error) -> Self {
        TransportError::Http(e)
    }
}

impl From<HexToArrayError> for Error {
    fn from(e: HexToArrayError) -> Self {
        Error::HexToArray(e)
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
