//! `ssdp listen [-i IFACE...]` — joins the SSDP multicast group on the
//! given (or all) interfaces and logs M-SEARCH traffic, without
//! answering (spec.md §6).

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::info;

use multicast_proxy_core::interface::{self, NetworkInterface};
use multicast_proxy_ssdp::codec::{SsdpRequest, SsdpResponse};
use multicast_proxy_ssdp::httpu::{
    bind_multicast, serve, Handler, DEFAULT_MAX_MESSAGE_BYTES, SSDP_MULTICAST_ADDR, SSDP_PORT,
};

struct LoggingHandler;

impl Handler for LoggingHandler {
    fn serve_message(&self, req: SsdpRequest, remote: SocketAddr) -> Vec<SsdpResponse> {
        info!(method = %req.method, remote = %remote, st = req.header("ST").unwrap_or(""), "ssdp listen: observed message");
        Vec::new()
    }
}

pub async fn listen(interface_names: &[String], shutdown: broadcast::Receiver<()>) -> Result<()> {
    let interfaces = if interface_names.is_empty() {
        NetworkInterface::list_all()
    } else {
        interface_names
            .iter()
            .map(|name| NetworkInterface::by_name(name))
            .collect::<Result<Vec<_>, _>>()
            .context("failed to resolve requested interfaces")?
    };
    let addresses: Vec<_> = interface::multicast_ipv4(&interfaces)
        .into_iter()
        .filter_map(|ip| match ip {
            std::net::IpAddr::V4(v4) => Some(v4),
            _ => None,
        })
        .collect();

    let socket = bind_multicast(SSDP_PORT, SSDP_MULTICAST_ADDR, &addresses).context("failed to join SSDP multicast group")?;
    socket.set_nonblocking(true)?;
    let socket = Arc::new(UdpSocket::from_std(socket)?);

    info!(interfaces = ?addresses, "ssdp listen: joined multicast group, logging traffic");
    serve(socket, Arc::new(LoggingHandler), DEFAULT_MAX_MESSAGE_BYTES, shutdown).await?;
    Ok(())
}
