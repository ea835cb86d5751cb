//! `interfaces list` — enumerate network interfaces (supplemented from
//! `original_source/cmd/interfaces/list.go`; wired to the teacher's
//! `print_interfaces()`).

use multicast_proxy_core::interface;

pub fn list() {
    interface::print_interfaces();
}
