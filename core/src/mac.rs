//! MAC address type shared across the capture, decode and policy layers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 6-byte Ethernet MAC address, canonical lowercase colon-separated on
/// display and (de)serialization.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr([u8; 6]);

pub const BRIDGE_MULTICAST_MAC_V4: MacAddr = MacAddr([0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb]);
pub const BRIDGE_MULTICAST_MAC_V6: MacAddr = MacAddr([0x33, 0x33, 0x00, 0x00, 0x00, 0xfb]);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// The canonical multicast destination MAC to rewrite onto a re-emitted
    /// frame, keyed by IP family (spec.md §4.8).
    pub const fn multicast_for(is_ipv6: bool) -> Self {
        if is_ipv6 {
            BRIDGE_MULTICAST_MAC_V6
        } else {
            BRIDGE_MULTICAST_MAC_V4
        }
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({})", self)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl std::str::FromStr for MacAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(format!("invalid MAC address '{s}': expected 6 colon-separated octets"));
        }
        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = u8::from_str_radix(part, 16)
                .map_err(|_| format!("invalid MAC address '{s}': bad octet '{part}'"))?;
        }
        Ok(MacAddr(bytes))
    }
}

impl Serialize for MacAddr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_round_trip() {
        let mac = MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        let s = mac.to_string();
        assert_eq!(s, "aa:bb:cc:dd:ee:ff");
        assert_eq!(s.parse::<MacAddr>().unwrap(), mac);
    }

    #[test]
    fn multicast_mac_by_family() {
        assert_eq!(
            MacAddr::multicast_for(false).to_string(),
            "01:00:5e:00:00:fb"
        );
        assert_eq!(
            MacAddr::multicast_for(true).to_string(),
            "33:33:00:00:00:fb"
        );
    }

    #[test]
    fn rejects_malformed_address() {
        assert!("not-a-mac".parse::<MacAddr>().is_err());
        assert!("aa:bb:cc".parse::<MacAddr>().is_err());
    }
}
