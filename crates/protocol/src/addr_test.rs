//! Tests for address helpers

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::addr::{RESERVED_RANGES, is_null_addr, is_reserved, prefix_of, to_ipv6};

fn mapped(a: u8, b: u8, c: u8, d: u8) -> Ipv6Addr {
    Ipv4Addr::new(a, b, c, d).to_ipv6_mapped()
}

#[test]
fn test_to_ipv6_maps_ipv4() {
    let addr = to_ipv6(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
    assert_eq!(addr.to_string(), "::ffff:192.0.2.1");
}

#[test]
fn test_prefix_ipv4_keeps_slash_24() {
    assert_eq!(prefix_of(mapped(8, 8, 4, 4)), mapped(8, 8, 4, 0));
}

#[test]
fn test_prefix_ipv6_keeps_slash_64() {
    let addr: Ipv6Addr = "2001:db8:1:2:3:4:5:6".parse().unwrap();
    let expected: Ipv6Addr = "2001:db8:1:2::".parse().unwrap();
    assert_eq!(prefix_of(addr), expected);
}

#[test]
fn test_null_addr() {
    assert!(is_null_addr(&Ipv6Addr::UNSPECIFIED));
    assert!(!is_null_addr(&mapped(1, 1, 1, 1)));
}

#[test]
fn test_reserved_ranges() {
    assert!(is_reserved(mapped(10, 1, 2, 3)));
    assert!(is_reserved(mapped(192, 168, 1, 1)));
    assert!(is_reserved(mapped(233, 252, 0, 7)));
    assert!(is_reserved("fd12::1".parse().unwrap()));
    assert!(!is_reserved(mapped(8, 8, 8, 8)));
    assert!(!is_reserved("2001:4860::8888".parse().unwrap()));
}

#[test]
fn test_reserved_list_keeps_duplicate_multicast_entry() {
    let multicast = RESERVED_RANGES
        .iter()
        .position(|r| r.start == IpAddr::V4(Ipv4Addr::new(224, 0, 0, 0)))
        .unwrap();
    let duplicate = RESERVED_RANGES
        .iter()
        .position(|r| r.start == IpAddr::V4(Ipv4Addr::new(233, 252, 0, 0)))
        .unwrap();
    assert_eq!(duplicate, multicast + 1);
    assert_eq!(RESERVED_RANGES.len(), 17);
}
