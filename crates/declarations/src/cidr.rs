//! CIDR helpers
//!
//! The service echoes CIDRs back in its own spelling (lower-case IPv6,
//! compressed zeros). Comparisons go through `ipnet` so a cosmetic
//! difference is never mistaken for a change.

use ipnet::IpNet;

/// Parse a CIDR, ignoring surrounding whitespace
pub fn parse_cidr(cidr: &str) -> Option<IpNet> {
    cidr.trim().parse::<IpNet>().ok()
}

/// Canonical spelling of `cidr`, or the trimmed input when it does not parse
pub fn canonical_cidr(cidr: &str) -> String {
    parse_cidr(cidr).map_or_else(|| cidr.trim().to_string(), |net| net.to_string())
}

pub fn same_cidr(a: &str, b: &str) -> bool {
    canonical_cidr(a) == canonical_cidr(b)
}

/// Prefix length of `cidr`, if it parses
pub fn prefix_len(cidr: &str) -> Option<u8> {
    parse_cidr(cidr).map(|net| net.prefix_len())
}
