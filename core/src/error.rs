//! Domain error kinds for the core crate (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("invalid VLAN id {0}: must fit in 12 bits and be in 1..=4094")]
    InvalidVlan(u32),

    #[error("device {mac} has origin_pool {pool} listed in its own shared_pools")]
    OriginInSharedPools { mac: String, pool: u16 },

    #[error("invalid MAC address '{0}'")]
    InvalidMac(String),

    #[error("net_interface cannot be empty")]
    EmptyInterface,

    #[error("no configuration file found in any of the search paths")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("interface '{0}' is not up")]
    InterfaceDown(String),

    #[error("ioctl failed: {0}")]
    Ioctl(String),

    #[error("failed to open capture on '{interface}': {source}")]
    Open { interface: String, source: pcap::Error },

    #[error("failed to compile or apply BPF filter: {0}")]
    Filter(pcap::Error),

    #[error("capture read error: {0}")]
    Read(pcap::Error),

    #[error("capture write error: {0}")]
    Write(pcap::Error),
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported ethertype 0x{0:04x}")]
    UnsupportedEthertype(u16),

    #[error("malformed {0} header")]
    Malformed(&'static str),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("parser thread panicked")]
    ParserPanicked,
}
