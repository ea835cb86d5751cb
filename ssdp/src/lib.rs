//! SSDP/HTTPU: wire codec, client, server and registry for the
//! multicast reflector (components C3-C6).

pub mod codec;
pub mod error;
pub mod httpu;
pub mod registry;
pub mod search;

pub use codec::{SsdpRequest, SsdpResponse};
pub use registry::{Entry, Registry, Update};
