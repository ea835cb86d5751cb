//! `ssdp proxy -c IFACE... -s IFACE...` — the active-probe variant
//! (spec.md §9's "Active-probe proxy" design note): listens on client
//! interfaces, issues an outbound M-SEARCH on server interfaces with
//! `MX` derived from the received request, and returns the responses
//! to the original client. Does not rewrite L2 — an application-layer
//! proxy, distinct from the reflector engine (C8).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tracing::{info, warn};

use multicast_proxy_core::interface::{self, NetworkInterface};
use multicast_proxy_ssdp::codec::{SsdpRequest, SsdpResponse};
use multicast_proxy_ssdp::httpu::{
    bind_multicast, serve, Handler, MultiHttpuClient, DEFAULT_MAX_MESSAGE_BYTES, SSDP_MULTICAST_ADDR, SSDP_PORT,
};
use multicast_proxy_ssdp::search;

const DEFAULT_MX_SECS: u64 = 2;
const IMPLEMENTATION_SLACK: Duration = Duration::from_millis(500);

struct ProxyHandler {
    server_client: MultiHttpuClient,
}

impl Handler for ProxyHandler {
    fn serve_message(&self, req: SsdpRequest, remote: SocketAddr) -> Vec<SsdpResponse> {
        if !req.method.eq_ignore_ascii_case("M-SEARCH") {
            return Vec::new();
        }
        let st = req.header("ST").unwrap_or(search::SSDP_ALL);
        let mx_secs: u64 = req.header("MX").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_MX_SECS);
        let deadline = Duration::from_secs(mx_secs) + IMPLEMENTATION_SLACK;

        info!(remote = %remote, st, mx_secs, "ssdp proxy: forwarding M-SEARCH to server interfaces");
        match search::raw_search(&self.server_client, st, 1, Some(deadline)) {
            Ok(responses) => responses,
            Err(e) => {
                warn!(error = %e, "ssdp proxy: upstream search failed");
                Vec::new()
            }
        }
    }
}

pub async fn proxy(client_interfaces: &[String], server_interfaces: &[String], shutdown: broadcast::Receiver<()>) -> Result<()> {
    let client_ifaces = resolve(client_interfaces)?;
    let server_ifaces = resolve(server_interfaces)?;

    let client_addrs: Vec<_> = interface::multicast_ipv4(&client_ifaces)
        .into_iter()
        .filter_map(|ip| match ip {
            std::net::IpAddr::V4(v4) => Some(v4),
            _ => None,
        })
        .collect();
    let server_addrs = interface::multicast_ipv4(&server_ifaces);

    let server_client = MultiHttpuClient::for_addresses(&server_addrs).context("failed to bind server-side HTTPU client")?;
    let handler = Arc::new(ProxyHandler { server_client });

    let socket = bind_multicast(SSDP_PORT, SSDP_MULTICAST_ADDR, &client_addrs).context("failed to join SSDP multicast group on client interfaces")?;
    socket.set_nonblocking(true)?;
    let socket = Arc::new(UdpSocket::from_std(socket)?);

    info!(clients = ?client_addrs, servers = ?server_addrs, "ssdp proxy: active-probe proxy started");
    serve(socket, handler, DEFAULT_MAX_MESSAGE_BYTES, shutdown).await?;
    Ok(())
}

fn resolve(names: &[String]) -> Result<Vec<NetworkInterface>> {
    if names.is_empty() {
        return Ok(NetworkInterface::list_all());
    }
    names
        .iter()
        .map(|name| NetworkInterface::by_name(name).map_err(anyhow::Error::from))
        .collect()
}
