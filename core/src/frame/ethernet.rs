//! Ethernet II + 802.1Q header layout.

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const VLAN_TAG_LEN: usize = 4;

pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;

pub const DST_MAC_OFFSET: usize = 0;
pub const SRC_MAC_OFFSET: usize = 6;
pub const ETHERTYPE_OFFSET: usize = 12;

/// Byte offsets of the fields a reflector rewrites or reads, located once
/// at parse time (spec.md §9's "buffer plus byte-offset spans" design).
#[derive(Debug, Clone, Copy)]
pub struct EthernetSpan {
    pub dst_mac_offset: usize,
    pub src_mac_offset: usize,
    /// TCI 2-byte offset, if the frame carries an 802.1Q tag.
    pub vlan_tci_offset: Option<usize>,
    /// Offset immediately after the Ethernet/802.1Q header, where the
    /// next layer (IPv4/IPv6) begins.
    pub payload_offset: usize,
    pub ethertype: u16,
}

pub fn parse(buf: &[u8]) -> Option<EthernetSpan> {
    if buf.len() < ETHERNET_HEADER_LEN {
        return None;
    }

    let outer_ethertype = u16::from_be_bytes([buf[ETHERTYPE_OFFSET], buf[ETHERTYPE_OFFSET + 1]]);

    if outer_ethertype == ETHERTYPE_VLAN {
        if buf.len() < ETHERNET_HEADER_LEN + VLAN_TAG_LEN {
            return None;
        }
        let tci_offset = ETHERTYPE_OFFSET + 2;
        let inner_ethertype_offset = tci_offset + 2;
        let ethertype = u16::from_be_bytes([buf[inner_ethertype_offset], buf[inner_ethertype_offset + 1]]);
        Some(EthernetSpan {
            dst_mac_offset: DST_MAC_OFFSET,
            src_mac_offset: SRC_MAC_OFFSET,
            vlan_tci_offset: Some(tci_offset),
            payload_offset: ETHERNET_HEADER_LEN + VLAN_TAG_LEN,
            ethertype,
        })
    } else {
        Some(EthernetSpan {
            dst_mac_offset: DST_MAC_OFFSET,
            src_mac_offset: SRC_MAC_OFFSET,
            vlan_tci_offset: None,
            payload_offset: ETHERNET_HEADER_LEN,
            ethertype: outer_ethertype,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tagged_frame() -> Vec<u8> {
        let mut buf = vec![0u8; ETHERNET_HEADER_LEN + VLAN_TAG_LEN];
        buf[0..6].copy_from_slice(&[0x01, 0x00, 0x5e, 0, 0, 0xfb]);
        buf[6..12].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        buf[12..14].copy_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        buf[14..16].copy_from_slice(&0x0014u16.to_be_bytes()); // VID 20
        buf[16..18].copy_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        buf
    }

    #[test]
    fn parses_vlan_tagged_frame() {
        let buf = sample_tagged_frame();
        let span = parse(&buf).unwrap();
        assert_eq!(span.vlan_tci_offset, Some(14));
        assert_eq!(span.payload_offset, 18);
        assert_eq!(span.ethertype, ETHERTYPE_IPV4);
    }

    #[test]
    fn parses_untagged_frame() {
        let mut buf = vec![0u8; ETHERNET_HEADER_LEN];
        buf[12..14].copy_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        let span = parse(&buf).unwrap();
        assert!(span.vlan_tci_offset.is_none());
        assert_eq!(span.payload_offset, ETHERNET_HEADER_LEN);
    }

    #[test]
    fn rejects_short_frame() {
        assert!(parse(&[0u8; 4]).is_none());
    }
}
