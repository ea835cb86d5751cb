//! `ssdp discover ST` — one-shot M-SEARCH for a given search target,
//! grounded on `original_source/cmd/ssdp/discover.go` and
//! `pkg/net/ssdp/search.go::SSDPRawSearchCtx`.

use std::time::Duration;

use anyhow::{Context, Result};
use multicast_proxy_core::interface::{self, NetworkInterface};
use multicast_proxy_ssdp::httpu::MultiHttpuClient;
use multicast_proxy_ssdp::search;

const NUM_SENDS: usize = 2;
const SEARCH_DEADLINE: Duration = Duration::from_secs(3);

pub fn discover(search_target: &str) -> Result<()> {
    let interfaces = NetworkInterface::list_all();
    let addresses = interface::multicast_ipv4(&interfaces);
    let client = MultiHttpuClient::for_addresses(&addresses).context("failed to bind HTTPU client sockets")?;

    let responses = search::raw_search(&client, search_target, NUM_SENDS, Some(SEARCH_DEADLINE))
        .context("SSDP search failed")?;

    println!("{} device(s) responded to ST={}", responses.len(), search_target);
    for resp in &responses {
        println!(
            "  {} USN={} LOCATION={}",
            resp.header("ST").unwrap_or("?"),
            resp.header("USN").unwrap_or("?"),
            resp.header("LOCATION").unwrap_or("?"),
        );
    }
    Ok(())
}
