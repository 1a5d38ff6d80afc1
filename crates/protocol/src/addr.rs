//! Address helpers
//!
//! All addresses are stored as IPv6. IPv4 addresses use the mapped form
//! `::ffff:a.b.c.d`, which is what the store's `toIPv6` produces.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// ICMP protocol number
pub const PROTOCOL_ICMP: u8 = 1;

/// UDP protocol number
pub const PROTOCOL_UDP: u8 = 17;

/// ICMPv6 protocol number
pub const PROTOCOL_ICMPV6: u8 = 58;

/// Inclusive address range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservedRange {
    pub start: IpAddr,
    pub end: IpAddr,
}

const fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

#[allow(clippy::too_many_arguments)]
const fn v6(a: u16, b: u16, c: u16, d: u16, e: u16, f: u16, g: u16, h: u16) -> IpAddr {
    IpAddr::V6(Ipv6Addr::new(a, b, c, d, e, f, g, h))
}

const fn range(start: IpAddr, end: IpAddr) -> ReservedRange {
    ReservedRange { start, end }
}

/// Reserved address ranges used by the `private_*` materialized columns.
///
/// Order and content match the results-table DDL, including the
/// `233.252.0.0/24` entry that the multicast range already covers.
pub const RESERVED_RANGES: &[ReservedRange] = &[
    range(v4(0, 0, 0, 0), v4(0, 255, 255, 255)),
    range(v4(10, 0, 0, 0), v4(10, 255, 255, 255)),
    range(v4(100, 64, 0, 0), v4(100, 127, 255, 255)),
    range(v4(127, 0, 0, 0), v4(127, 255, 255, 255)),
    range(v4(169, 254, 0, 0), v4(169, 254, 255, 255)),
    range(v4(172, 16, 0, 0), v4(172, 31, 255, 255)),
    range(v4(192, 0, 0, 0), v4(192, 0, 0, 255)),
    range(v4(192, 0, 2, 0), v4(192, 0, 2, 255)),
    range(v4(192, 88, 99, 0), v4(192, 88, 99, 255)),
    range(v4(192, 168, 0, 0), v4(192, 168, 255, 255)),
    range(v4(198, 18, 0, 0), v4(198, 19, 255, 255)),
    range(v4(198, 51, 100, 0), v4(198, 51, 100, 255)),
    range(v4(203, 0, 113, 0), v4(203, 0, 113, 255)),
    range(v4(224, 0, 0, 0), v4(239, 255, 255, 255)),
    range(v4(233, 252, 0, 0), v4(233, 252, 0, 255)),
    range(v4(240, 0, 0, 0), v4(255, 255, 255, 255)),
    range(
        v6(0xfd00, 0, 0, 0, 0, 0, 0, 0),
        v6(0xfdff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff),
    ),
];

/// Convert any address to its IPv6 storage form
#[inline]
pub fn to_ipv6(addr: IpAddr) -> Ipv6Addr {
    match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    }
}

/// Prefix of an address, as `toIPv6(cutIPv6(addr, 8, 1))` computes it.
///
/// IPv4-mapped addresses keep their /24, native IPv6 addresses their /64.
pub fn prefix_of(addr: Ipv6Addr) -> Ipv6Addr {
    let mut octets = addr.octets();
    if addr.to_ipv4_mapped().is_some() {
        octets[15] = 0;
    } else {
        octets[8..].fill(0);
    }
    Ipv6Addr::from(octets)
}

/// The store has no nullable IPv6 here; a missing reply is `::`.
#[inline]
pub fn is_null_addr(addr: &Ipv6Addr) -> bool {
    addr.is_unspecified()
}

/// Whether an address lies in any of [`RESERVED_RANGES`]
pub fn is_reserved(addr: Ipv6Addr) -> bool {
    let value = u128::from(addr);
    RESERVED_RANGES.iter().any(|r| {
        let start = u128::from(to_ipv6(r.start));
        let end = u128::from(to_ipv6(r.end));
        value >= start && value <= end
    })
}
