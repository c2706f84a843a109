//! Host network addresses for building a join URL.
//!
//! Clients render a QR code pointing at this machine, so the address a phone
//! on the same network can actually reach should come first. The ranking is
//! a heuristic over interface names and private ranges:
//! - wireless adapters beat wired ones
//! - 172.16.0.0/12 > 192.168.0.0/16 > 10.0.0.0/8 > anything else
//! - virtual adapters (VPNs, hypervisors, containers) sink to the bottom

use std::net::{IpAddr, Ipv4Addr};

use serde::Serialize;
use tracing::warn;

const WIRELESS_PATTERNS: &[&str] = &["wlan", "wlp", "wi-fi", "wifi", "wireless", "airport"];
const VIRTUAL_PATTERNS: &[&str] = &[
    "virtual", "vmware", "vmnet", "vbox", "virtualbox", "hyper-v", "vethernet", "docker", "veth", "br-", "wsl",
    "utun", "tailscale", "zerotier", "loopback",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    pub ips: Vec<String>,
    pub preferred: Option<String>,
}

/// Enumerate and rank local IPv4 addresses. Enumeration failure yields an empty list.
#[must_use]
pub fn host_info() -> HostInfo {
    let candidates = match if_addrs::get_if_addrs() {
        Ok(ifaces) => ifaces
            .into_iter()
            .filter(|iface| !iface.is_loopback())
            .filter_map(|iface| match iface.ip() {
                IpAddr::V4(ip) => Some((iface.name, ip)),
                IpAddr::V6(_) => None,
            })
            .collect(),
        Err(e) => {
            warn!(error = %e, "hostinfo: interface enumeration failed");
            Vec::new()
        }
    };
    rank(candidates)
}

/// Order candidate `(interface name, address)` pairs best-first.
#[must_use]
pub fn rank(mut candidates: Vec<(String, Ipv4Addr)>) -> HostInfo {
    candidates.retain(|(_, ip)| !ip.is_loopback() && !ip.is_unspecified() && !ip.is_link_local());
    candidates.sort_by(|(a_name, a_ip), (b_name, b_ip)| {
        score(b_name, *b_ip)
            .cmp(&score(a_name, *a_ip))
            .then_with(|| a_name.cmp(b_name))
            .then_with(|| a_ip.cmp(b_ip))
    });

    let mut ips: Vec<String> = Vec::with_capacity(candidates.len());
    for (_, ip) in candidates {
        let ip = ip.to_string();
        if !ips.contains(&ip) {
            ips.push(ip);
        }
    }
    let preferred = ips.first().cloned();
    HostInfo { ips, preferred }
}

fn score(name: &str, ip: Ipv4Addr) -> i32 {
    let name = name.to_ascii_lowercase();
    let mut score = match ip.octets() {
        [172, b, ..] if (16..=31).contains(&b) => 30,
        [192, 168, ..] => 20,
        [10, ..] => 10,
        _ => 0,
    };
    if WIRELESS_PATTERNS.iter().any(|p| name.contains(p)) {
        score += 50;
    }
    if VIRTUAL_PATTERNS.iter().any(|p| name.contains(p)) {
        score -= 100;
    }
    score
}

#[cfg(test)]
#[path = "hostinfo_test.rs"]
mod tests;
