//! Network interface enumeration (C1).

use pnet::datalink::{self, NetworkInterface as PnetInterface};
use std::net::IpAddr;
use tracing::{info, warn};

use crate::error::CaptureError;
use crate::mac::MacAddr;

/// Represents a network interface as seen by the OS.
#[derive(Debug, Clone)]
pub struct NetworkInterface {
    pub name: String,
    pub index: u32,
    pub mac: Option<MacAddr>,
    pub ips: Vec<IpAddr>,
    pub is_up: bool,
    pub is_loopback: bool,
    pub is_multicast: bool,
}

impl NetworkInterface {
    pub fn by_name(name: &str) -> Result<Self, CaptureError> {
        datalink::interfaces()
            .into_iter()
            .find(|i| i.name == name)
            .map(Self::from_pnet)
            .ok_or_else(|| CaptureError::InterfaceNotFound(name.to_string()))
    }

    pub fn list_all() -> Vec<Self> {
        datalink::interfaces().into_iter().map(Self::from_pnet).collect()
    }

    fn from_pnet(iface: PnetInterface) -> Self {
        let mac = iface.mac.map(|m| MacAddr::new(m.octets()));
        let ips: Vec<IpAddr> = iface.ips.iter().map(|ip| ip.ip()).collect();
        let is_up = iface.is_up();
        let is_loopback = iface.is_loopback();
        let is_multicast = iface.is_multicast();
        let index = iface.index;

        Self {
            name: iface.name,
            index,
            mac,
            ips,
            is_up,
            is_loopback,
            is_multicast,
        }
    }

    pub fn validate_for_capture(&self) -> Result<(), CaptureError> {
        if !self.is_up {
            return Err(CaptureError::InterfaceDown(self.name.clone()));
        }
        if self.is_loopback {
            warn!("interface '{}' is a loopback interface", self.name);
        }
        info!(
            interface = %self.name,
            mac = %self.mac.map(|m| m.to_string()).unwrap_or_else(|| "unknown".into()),
            ?self.ips,
            "interface validated for capture"
        );
        Ok(())
    }

    /// Set or clear promiscuous mode via `SIOCGIFFLAGS`/`SIOCSIFFLAGS`.
    #[cfg(target_os = "linux")]
    pub fn set_promiscuous(&self, enable: bool) -> Result<(), CaptureError> {
        use libc::{c_short, ioctl, socket, AF_INET, IFF_PROMISC, SIOCGIFFLAGS, SIOCSIFFLAGS, SOCK_DGRAM};
        use std::ffi::CString;
        use std::mem::zeroed;

        #[repr(C)]
        struct Ifreq {
            ifr_name: [libc::c_char; 16],
            ifr_flags: c_short,
        }

        unsafe {
            let sock = socket(AF_INET, SOCK_DGRAM, 0);
            if sock < 0 {
                return Err(CaptureError::Ioctl("failed to create control socket".into()));
            }

            let ifname = CString::new(self.name.as_str())
                .map_err(|_| CaptureError::Ioctl("interface name contains a NUL byte".into()))?;
            let mut req: Ifreq = zeroed();
            for (i, &b) in ifname.as_bytes_with_nul().iter().take(15).enumerate() {
                req.ifr_name[i] = b as libc::c_char;
            }

            if ioctl(sock, SIOCGIFFLAGS as libc::c_ulong, &mut req as *mut Ifreq) < 0 {
                libc::close(sock);
                return Err(CaptureError::Ioctl(format!(
                    "failed to get interface flags for '{}'",
                    self.name
                )));
            }

            if enable {
                req.ifr_flags |= IFF_PROMISC as c_short;
            } else {
                req.ifr_flags &= !(IFF_PROMISC as c_short);
            }

            if ioctl(sock, SIOCSIFFLAGS as libc::c_ulong, &req as *const Ifreq) < 0 {
                libc::close(sock);
                return Err(CaptureError::Ioctl(format!(
                    "failed to set promiscuous mode on '{}' (are you running as root?)",
                    self.name
                )));
            }

            libc::close(sock);
        }

        info!(interface = %self.name, enable, "promiscuous mode toggled");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn set_promiscuous(&self, enable: bool) -> Result<(), CaptureError> {
        warn!(
            "promiscuous mode control is not implemented on this platform (interface={}, requested={})",
            self.name, enable
        );
        Ok(())
    }
}

/// C1 operation: interfaces suitable as HTTPU client source addresses —
/// multicast-capable, up, non-loopback — with their IPv4 addresses, in
/// input order, duplicates not suppressed (spec.md §4.1).
pub fn multicast_ipv4(interfaces: &[NetworkInterface]) -> Vec<IpAddr> {
    interfaces
        .iter()
        .filter(|i| i.is_multicast && i.is_up && !i.is_loopback)
        .flat_map(|i| i.ips.iter().copied())
        .filter(|ip| ip.is_ipv4())
        .collect()
}

pub fn print_interfaces() {
    println!("Available network interfaces:");
    println!("{:-<60}", "");
    for iface in NetworkInterface::list_all() {
        let mac_str = iface.mac.map(|m| m.to_string()).unwrap_or_else(|| "N/A".to_string());
        let status = if iface.is_up { "UP" } else { "DOWN" };
        let loopback = if iface.is_loopback { " (loopback)" } else { "" };
        println!("{}: {} [{}{}]", iface.name, mac_str, status, loopback);
        for ip in &iface.ips {
            println!("    {}", ip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn iface(name: &str, multicast: bool, up: bool, loopback: bool, ips: Vec<IpAddr>) -> NetworkInterface {
        NetworkInterface {
            name: name.to_string(),
            index: 0,
            mac: None,
            ips,
            is_up: up,
            is_loopback: loopback,
            is_multicast: multicast,
        }
    }

    #[test]
    fn multicast_ipv4_filters_and_preserves_order() {
        let eth0 = iface(
            "eth0",
            true,
            true,
            false,
            vec![
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
                IpAddr::V6("fe80::1".parse().unwrap()),
            ],
        );
        let lo = iface("lo", true, true, true, vec![IpAddr::V4(Ipv4Addr::LOCALHOST)]);
        let down = iface("eth1", true, false, false, vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))]);
        let no_mc = iface("eth2", false, true, false, vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))]);

        let result = multicast_ipv4(&[eth0, lo, down, no_mc]);
        assert_eq!(result, vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10))]);
    }
}
