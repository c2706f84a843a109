use super::*;

fn cand(name: &str, ip: [u8; 4]) -> (String, Ipv4Addr) {
    (name.to_owned(), Ipv4Addr::from(ip))
}

#[test]
fn private_ranges_ranked_172_then_192_then_10() {
    let info = rank(vec![
        cand("eth0", [10, 0, 0, 5]),
        cand("eth1", [192, 168, 1, 20]),
        cand("eth2", [172, 20, 0, 3]),
    ]);
    assert_eq!(info.ips, vec!["172.20.0.3", "192.168.1.20", "10.0.0.5"]);
    assert_eq!(info.preferred.as_deref(), Some("172.20.0.3"));
}

#[test]
fn wireless_adapter_preferred_over_wired() {
    let info = rank(vec![cand("eth0", [172, 16, 0, 2]), cand("wlan0", [192, 168, 0, 7])]);
    assert_eq!(info.preferred.as_deref(), Some("192.168.0.7"));
}

#[test]
fn virtual_adapters_sink() {
    let info = rank(vec![
        cand("docker0", [172, 17, 0, 1]),
        cand("vEthernet (WSL)", [172, 28, 0, 1]),
        cand("en0", [10, 1, 1, 1]),
    ]);
    assert_eq!(info.preferred.as_deref(), Some("10.1.1.1"));
    assert_eq!(info.ips.len(), 3);
}

#[test]
fn addresses_outside_172_16_block_are_not_private() {
    let info = rank(vec![cand("eth0", [172, 32, 0, 1]), cand("eth1", [10, 0, 0, 1])]);
    assert_eq!(info.preferred.as_deref(), Some("10.0.0.1"));
}

#[test]
fn loopback_and_link_local_are_excluded() {
    let info = rank(vec![cand("lo", [127, 0, 0, 1]), cand("eth0", [169, 254, 3, 4])]);
    assert!(info.ips.is_empty());
    assert!(info.preferred.is_none());
}

#[test]
fn duplicate_addresses_collapse() {
    let info = rank(vec![cand("eth0", [192, 168, 1, 2]), cand("eth0:1", [192, 168, 1, 2])]);
    assert_eq!(info.ips, vec!["192.168.1.2"]);
}

#[test]
fn serializes_null_preferred_for_empty_list() {
    let value = serde_json::to_value(rank(Vec::new())).unwrap();
    assert_eq!(value, serde_json::json!({"ips": [], "preferred": null}));
}
