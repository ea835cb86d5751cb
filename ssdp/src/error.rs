//! Domain error kinds for the ssdp crate (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty message")]
    Empty,

    #[error("malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("malformed status line: {0:?}")]
    MalformedStatusLine(String),

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("message is not valid UTF-8")]
    InvalidEncoding,
}

#[derive(Debug, Error)]
pub enum HttpuError {
    #[error("failed to bind local socket on {0}: {1}")]
    Bind(std::net::IpAddr, std::io::Error),

    #[error("host '{0}' did not resolve to any address")]
    UnresolvableHost(String),

    #[error("short write: sent {sent} of {expected} bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no delegate clients available")]
    NoDelegates,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("missing required header '{0}'")]
    MissingHeader(&'static str),

    #[error("CACHE-CONTROL must contain max-age in 1..=86400, got {0}")]
    InvalidMaxAge(i64),

    #[error("LOCATION did not parse as a URL: {0}")]
    InvalidLocation(#[from] url::ParseError),

    #[error("{header} must be a signed 32-bit integer, got {value:?}")]
    InvalidInteger { header: &'static str, value: String },

    #[error("SEARCHPORT.UPNP.ORG must be in 1..=65535, got {0}")]
    InvalidSearchPort(i64),

    #[error("unknown NTS value: {0:?}")]
    UnknownNts(String),
}
