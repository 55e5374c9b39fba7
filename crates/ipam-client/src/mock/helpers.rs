//! Helpers shared by the mock resource modules

use super::{Resource, Verb};
use crate::error::IpamError;
use crate::models::ListOptions;
use ipnet::IpNet;

/// Route prefix for a resource family
pub(crate) fn route(resource: Resource) -> &'static str {
    match resource {
        Resource::Environment => "/api/environments",
        Resource::Pool => "/api/pools",
        Resource::Block => "/api/blocks",
        Resource::Allocation => "/api/allocations",
        Resource::ReservedBlock => "/api/reserved-blocks",
    }
}

fn method(verb: Verb) -> &'static str {
    match verb {
        Verb::List | Verb::Get => "GET",
        Verb::Create | Verb::AutoAllocate => "POST",
        Verb::Update => "PUT",
        Verb::Delete => "DELETE",
    }
}

/// Build the error the real client would produce for this response. The
/// message goes through the same `{"error": ...}` body extraction.
pub(crate) fn api_error(verb: Verb, resource: Resource, id: Option<&str>, status: u16, message: &str) -> IpamError {
    let path = match (verb, id) {
        (Verb::AutoAllocate, _) => format!("{}/auto", route(resource)),
        (_, Some(id)) => format!("{}/{}", route(resource), id),
        (_, None) => route(resource).to_string(),
    };
    let body = serde_json::json!({ "error": message }).to_string();
    IpamError::from_response(method(verb), &path, status, &body)
}

pub(crate) fn not_found(verb: Verb, resource: Resource, id: &str, what: &str) -> IpamError {
    api_error(verb, resource, Some(id), 404, &format!("{} not found", what))
}

pub(crate) fn bad_request(verb: Verb, resource: Resource, message: &str) -> IpamError {
    api_error(verb, resource, None, 400, message)
}

pub(crate) fn conflict(verb: Verb, resource: Resource, message: &str) -> IpamError {
    api_error(verb, resource, None, 409, message)
}

/// Parse a CIDR the way the service does: surrounding whitespace is ignored
pub(crate) fn parse_cidr(cidr: &str) -> Option<IpNet> {
    cidr.trim().parse::<IpNet>().ok()
}

pub(crate) fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

/// 2^128 does not fit in a u128; an IPv6 /0 is reported with this literal
const IPV6_ALL: &str = "340282366920938463463374607431768211456";

/// Number of addresses in `net`, or `None` for an IPv6 /0
pub(crate) fn address_count(net: &IpNet) -> Option<u128> {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    1u128.checked_shl(host_bits)
}

/// `(total, used, available)` as decimal strings for a block of `net` with
/// `used` addresses allocated
pub(crate) fn ip_counts(net: &IpNet, used: u128) -> (String, String, String) {
    match address_count(net) {
        Some(total) => (
            total.to_string(),
            used.to_string(),
            total.saturating_sub(used).to_string(),
        ),
        None if used == 0 => (IPV6_ALL.to_string(), "0".to_string(), IPV6_ALL.to_string()),
        // 2^128 - used == (u128::MAX - used) + 1, which fits for used >= 1
        None => (IPV6_ALL.to_string(), used.to_string(), (u128::MAX - used + 1).to_string()),
    }
}

/// Slice one page out of `items` and report the unpaginated total
pub(crate) fn paginate<T: Clone>(items: &[T], options: ListOptions) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = options.offset.unwrap_or(0) as usize;
    let page = items
        .iter()
        .skip(offset)
        .take(options.limit.map_or(usize::MAX, |l| l as usize))
        .cloned()
        .collect();
    (page, total)
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
