//! Packet parser (C7): classifies a captured L2 frame into mutable
//! field spans plus a protocol/query classification, per spec.md §4.7.
//!
//! Decoding here is eager rather than lazy — see SPEC_FULL.md §4.7 for
//! why that's a faithful simplification rather than a shortcut.

mod dns;
mod ethernet;
mod ip;
mod udp;

use std::net::IpAddr;

use multicast_proxy_ssdp::codec::SniffResult;

use crate::error::ParseError;
use crate::mac::MacAddr;
use crate::vlan::VlanInfo;

pub const MDNS_PORT: u16 = 5353;
pub const SSDP_PORT: u16 = 1900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Ssdp,
    Mdns,
    None,
}

/// A captured frame, represented as its raw bytes plus byte-offset spans
/// for every field the engine may rewrite (spec.md §9's "buffer plus
/// byte-offset spans" design note).
#[derive(Debug, Clone)]
pub struct ClassifiedFrame {
    pub raw: Vec<u8>,
    dst_mac_offset: usize,
    src_mac_offset: usize,
    vlan_tci_offset: Option<usize>,
    pub is_ipv6: bool,
    pub protocol: Protocol,
    pub is_query: bool,
    pub src_ip: Option<IpAddr>,
    pub dst_ip: Option<IpAddr>,
    /// Extracted query strings, diagnostics only (spec.md §3).
    pub queries: Vec<String>,
}

impl ClassifiedFrame {
    pub fn src_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.raw[self.src_mac_offset..self.src_mac_offset + 6]).expect("6 bytes")
    }

    pub fn dst_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.raw[self.dst_mac_offset..self.dst_mac_offset + 6]).expect("6 bytes")
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        self.raw[self.src_mac_offset..self.src_mac_offset + 6].copy_from_slice(mac.as_bytes());
    }

    pub fn set_dst_mac(&mut self, mac: MacAddr) {
        self.raw[self.dst_mac_offset..self.dst_mac_offset + 6].copy_from_slice(mac.as_bytes());
    }

    pub fn vlan_id(&self) -> Option<u16> {
        self.vlan_tci_offset.map(|o| {
            let tci = u16::from_be_bytes([self.raw[o], self.raw[o + 1]]);
            VlanInfo::from_tci(tci).id
        })
    }

    /// Rewrites the VLAN ID in place, preserving PCP/DEI bits. No-op on
    /// an untagged frame (there is nowhere to write a tag without
    /// growing the buffer, which is out of scope — untagged frames are
    /// dropped by the engine's BPF filter before reaching this point).
    pub fn set_vlan_id(&mut self, id: u16) {
        if let Some(o) = self.vlan_tci_offset {
            let tci = u16::from_be_bytes([self.raw[o], self.raw[o + 1]]);
            let rewritten = VlanInfo::from_tci(tci).with_id(id).to_tci();
            self.raw[o..o + 2].copy_from_slice(&rewritten.to_be_bytes());
        }
    }
}

/// Parses a raw captured frame into a `ClassifiedFrame`. Never panics on
/// malformed input; yields `Protocol::None` for anything it cannot
/// classify rather than erroring, per spec.md §4.7 ("the parser must not
/// panic ... misclassified frames are yielded with protocol = none").
/// Only returns `Err` when the frame is too short to contain even an
/// Ethernet header.
pub fn parse(raw: Vec<u8>) -> Result<ClassifiedFrame, ParseError> {
    let eth = ethernet::parse(&raw).ok_or(ParseError::TooShort(raw.len()))?;

    let network = match eth.ethertype {
        ethernet::ETHERTYPE_IPV4 => ip::parse_ipv4(&raw, eth.payload_offset),
        ethernet::ETHERTYPE_IPV6 => ip::parse_ipv6(&raw, eth.payload_offset),
        _ => None,
    };

    let mut frame = ClassifiedFrame {
        raw,
        dst_mac_offset: eth.dst_mac_offset,
        src_mac_offset: eth.src_mac_offset,
        vlan_tci_offset: eth.vlan_tci_offset,
        is_ipv6: false,
        protocol: Protocol::None,
        is_query: false,
        src_ip: None,
        dst_ip: None,
        queries: Vec::new(),
    };

    let Some(network) = network else {
        return Ok(frame);
    };
    frame.is_ipv6 = network.is_ipv6;
    frame.src_ip = Some(network.src_ip);
    frame.dst_ip = Some(network.dst_ip);

    if network.protocol != ip::PROTO_UDP {
        return Ok(frame);
    }
    let Some(transport) = udp::parse(&frame.raw, network.payload_offset) else {
        return Ok(frame);
    };
    let payload_start = transport.payload_offset;
    let payload_end = payload_start + transport.payload_len;
    let Some(payload) = frame.raw.get(payload_start..payload_end) else {
        return Ok(frame);
    };

    classify_payload(&mut frame, transport.dst_port, payload);
    Ok(frame)
}

fn classify_payload(frame: &mut ClassifiedFrame, dst_port: u16, payload: &[u8]) {
    match multicast_proxy_ssdp::codec::sniff(payload) {
        SniffResult::Query => {
            frame.protocol = Protocol::Ssdp;
            frame.is_query = true;
        }
        SniffResult::Advertisement | SniffResult::Response => {
            frame.protocol = Protocol::Ssdp;
            frame.is_query = false;
        }
        SniffResult::NotSsdp if dst_port == MDNS_PORT => {
            if let Some((is_query, names)) = dns::classify(payload) {
                frame.protocol = Protocol::Mdns;
                frame.is_query = is_query;
                frame.queries = names;
            }
        }
        SniffResult::NotSsdp => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ethernet_ipv4_udp_frame(vlan_id: Option<u16>, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0x01, 0x00, 0x5e, 0, 0, 0xfb]); // dst
        buf.extend_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]); // src

        if let Some(id) = vlan_id {
            buf.extend_from_slice(&ethernet::ETHERTYPE_VLAN.to_be_bytes());
            let tci = VlanInfo { id, priority: 0, dei: false }.to_tci();
            buf.extend_from_slice(&tci.to_be_bytes());
        }
        buf.extend_from_slice(&ethernet::ETHERTYPE_IPV4.to_be_bytes());

        // IPv4 header
        buf.push(0x45);
        buf.push(0);
        let udp_len = 8 + payload.len();
        let total_len = 20 + udp_len;
        buf.extend_from_slice(&(total_len as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]); // id, flags/frag
        buf.push(64); // ttl
        buf.push(17); // udp
        buf.extend_from_slice(&[0, 0]); // checksum
        buf.extend_from_slice(&[192, 168, 1, 1]); // src ip
        buf.extend_from_slice(&[239, 255, 255, 250]); // dst ip

        // UDP header
        buf.extend_from_slice(&1900u16.to_be_bytes());
        buf.extend_from_slice(&1900u16.to_be_bytes());
        buf.extend_from_slice(&(udp_len as u16).to_be_bytes());
        buf.extend_from_slice(&[0, 0]); // checksum
        buf.extend_from_slice(payload);

        buf
    }

    #[test]
    fn classifies_ssdp_msearch_as_query() {
        let payload = b"M-SEARCH * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nMAN: \"ssdp:discover\"\r\nMX: 2\r\nST: ssdp:all\r\n\r\n";
        let raw = ethernet_ipv4_udp_frame(Some(20), payload);
        let frame = parse(raw).unwrap();
        assert_eq!(frame.protocol, Protocol::Ssdp);
        assert!(frame.is_query);
        assert_eq!(frame.vlan_id(), Some(20));
    }

    #[test]
    fn rewrites_vlan_and_macs_in_place() {
        let payload = b"M-SEARCH * HTTP/1.1\r\nST: ssdp:all\r\n\r\n";
        let raw = ethernet_ipv4_udp_frame(Some(20), payload);
        let mut frame = parse(raw).unwrap();

        frame.set_vlan_id(30);
        let bridge = MacAddr::new([1, 2, 3, 4, 5, 6]);
        frame.set_src_mac(bridge);
        frame.set_dst_mac(MacAddr::multicast_for(false));

        assert_eq!(frame.vlan_id(), Some(30));
        assert_eq!(frame.src_mac(), bridge);
        assert_eq!(frame.dst_mac(), MacAddr::multicast_for(false));
    }

    #[test]
    fn untagged_frame_has_no_vlan_id() {
        let payload = b"NOTIFY * HTTP/1.1\r\nNTS: ssdp:alive\r\n\r\n";
        let raw = ethernet_ipv4_udp_frame(None, payload);
        let frame = parse(raw).unwrap();
        assert!(frame.vlan_id().is_none());
    }

    #[test]
    fn garbage_payload_is_classified_none_not_panicking() {
        let raw = ethernet_ipv4_udp_frame(Some(10), b"\x00\x01\x02garbage");
        let frame = parse(raw).unwrap();
        assert_eq!(frame.protocol, Protocol::None);
    }
}
