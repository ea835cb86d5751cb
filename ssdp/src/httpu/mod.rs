//! HTTPU: HTTP-shaped request/response framing over UDP (C4 client, C5 server).

pub mod client;
pub mod server;

pub use client::{HttpuClient, HttpuClientLike, MultiHttpuClient, DEFAULT_TIMEOUT};
pub use server::{bind_multicast, serve, Handler, DEFAULT_MAX_MESSAGE_BYTES, SSDP_MULTICAST_ADDR, SSDP_PORT};
