//! Raw L2 capture (C2 sibling, C8 preflight): opens the trunked
//! interface in promiscuous mode, applies the BPF filter that narrows
//! capture to VLAN-tagged mDNS/SSDP multicast traffic, and re-injects
//! rewritten frames.
//!
//! Grounded on `original_source/pkg/net/reflector/serve.go` for the BPF
//! filter string and the `OpenLive`/`SetBPFFilter`/`WritePacketData`
//! sequence. `pnet::datalink` (the teacher's capture stack) has no BPF
//! filter API, so this module reaches for `pcap` directly — the same
//! crate the original links against via `gopacket`.

use pcap::{Active, Capture, Device};
use tracing::{debug, info};

use crate::error::CaptureError;
use crate::interface::NetworkInterface;
use crate::mac::MacAddr;

const SNAPLEN: i32 = 65536;
const READ_TIMEOUT_MS: i32 = 1000;

/// The BPF filter applied to the trunked interface (spec.md §4.8): only
/// VLAN-tagged frames addressed to the SSDP or mDNS multicast groups on
/// their conventional ports, excluding anything the bridge itself sent
/// (to avoid re-ingesting its own re-emitted frames).
pub fn bpf_filter(bridge_mac: MacAddr) -> String {
    format!(
        "not (ether src {bridge_mac}) and vlan and \
         ((dst net (239.255.255.250 or ff02::c) and udp dst port 1900) or \
         (dst net (224.0.0.251 or ff02::fb) and udp dst port 5353))"
    )
}

/// An open capture handle on one trunked interface.
pub struct RawCapture {
    inner: Capture<Active>,
    bridge_mac: MacAddr,
}

impl RawCapture {
    pub fn open(interface_name: &str) -> Result<Self, CaptureError> {
        let iface = NetworkInterface::by_name(interface_name)?;
        iface.validate_for_capture()?;
        let bridge_mac = iface.mac.ok_or_else(|| CaptureError::InterfaceNotFound(interface_name.to_string()))?;

        let device = Device::list()
            .map_err(|e| CaptureError::Open { interface: interface_name.to_string(), source: e })?
            .into_iter()
            .find(|d| d.name == interface_name)
            .ok_or_else(|| CaptureError::InterfaceNotFound(interface_name.to_string()))?;

        let mut inner = Capture::from_device(device)
            .map_err(|e| CaptureError::Open { interface: interface_name.to_string(), source: e })?
            .snaplen(SNAPLEN)
            .promisc(true)
            .timeout(READ_TIMEOUT_MS)
            .open()
            .map_err(|e| CaptureError::Open { interface: interface_name.to_string(), source: e })?;

        let filter = bpf_filter(bridge_mac);
        debug!(%filter, "applying BPF filter");
        inner.filter(&filter, true).map_err(CaptureError::Filter)?;

        info!(interface = interface_name, bridge_mac = %bridge_mac, "capture opened");
        Ok(Self { inner, bridge_mac })
    }

    pub fn bridge_mac(&self) -> MacAddr {
        self.bridge_mac
    }

    /// Blocks until the next frame arrives (or the read timeout elapses,
    /// in which case the caller should retry). Returns an owned copy —
    /// the `pcap` crate's borrowed `Packet<'_>` cannot outlive the call.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CaptureError> {
        match self.inner.next_packet() {
            Ok(packet) => Ok(Some(packet.data.to_vec())),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(CaptureError::Read(e)),
        }
    }

    pub fn send(&mut self, frame: &[u8]) -> Result<(), CaptureError> {
        self.inner.sendpacket(frame).map_err(CaptureError::Write)
    }
}
