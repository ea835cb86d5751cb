//! Layer-2 capture, frame classification and reflector engine for the
//! mDNS/SSDP multicast proxy (components C1, C2, C7, C8, C9).

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod interface;
pub mod mac;
pub mod policy;
pub mod vlan;

pub use config::Config;
pub use mac::MacAddr;
