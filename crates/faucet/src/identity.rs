//! Rate-limit key for the network origin of a request.

/// Header trusted proxies append the client address to.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Derives the origin identity of a request.
///
/// With `proxy_hops == 0`, or without a forwarded-for value, this is the
/// connection address minus its port. Otherwise it is the forwarded-for entry
/// `proxy_hops` positions from the end, which is the address recorded by the
/// outermost trusted proxy; anything before it may be client-supplied.
pub fn origin_identity(remote_addr: &str, forwarded_for: Option<&str>, proxy_hops: usize) -> String {
    if proxy_hops > 0 {
        if let Some(forwarded) = forwarded_for.filter(|f| !f.is_empty()) {
            let hops: Vec<&str> = forwarded.split(',').collect();
            let index = hops.len().saturating_sub(proxy_hops);
            return hops[index].trim().to_string();
        }
    }

    split_host(remote_addr).unwrap_or(remote_addr).to_string()
}

/// Host part of `host:port` or `[host]:port`. `None` when there is no port
/// or the host itself is an unbracketed IPv6 literal.
fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        return tail.starts_with(':').then_some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    (!host.contains(':')).then_some(host)
}
