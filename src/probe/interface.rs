use pnet::datalink::{self, NetworkInterface};
use pnet::ipnetwork::IpNetwork;
use std::net::Ipv4Addr;

/// Picks the address a listener binds to when none is given: the first
/// non-loopback IPv4 address on any interface, or loopback if there is none.
pub fn primary_ipv4() -> Ipv4Addr {
    first_non_loopback_ipv4(&datalink::interfaces()).unwrap_or(Ipv4Addr::LOCALHOST)
}

pub fn first_non_loopback_ipv4(interfaces: &[NetworkInterface]) -> Option<Ipv4Addr> {
    interfaces
        .iter()
        .flat_map(|iface| iface.ips.iter())
        .find_map(|ip| match ip {
            IpNetwork::V4(net) if !net.ip().is_loopback() => Some(net.ip()),
            _ => None,
        })
}
