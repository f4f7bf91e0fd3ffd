//! Management API address parsing.
//!
//! Raw addresses come from configuration as a comma-separated list. Each entry
//! may omit the scheme and port; both are filled in from the TLS flag.

use url::Url;

/// Management plugin port without TLS.
pub const DEFAULT_API_PORT: u16 = 15672;

/// Management port when TLS is enabled.
pub const DEFAULT_TLS_API_PORT: u16 = 443;

/// Parse every usable address out of a comma-separated list.
///
/// Invalid entries are skipped, duplicates collapse onto their first occurrence
/// so the configured order is preserved.
pub fn parse_api_addresses(raw: &str, use_tls: bool) -> Vec<Url> {
    let mut addresses: Vec<Url> = Vec::new();
    for entry in raw.split(',') {
        match normalize_api_address(entry, use_tls) {
            Some(url) if !addresses.contains(&url) => addresses.push(url),
            Some(_) => {}
            None if entry.trim().is_empty() => {}
            None => tracing::warn!(address = %entry.trim(), "Ignoring invalid management API address"),
        }
    }
    addresses
}

/// Normalize a single address into an absolute `http`/`https` URL with a port.
pub fn normalize_api_address(raw: &str, use_tls: bool) -> Option<Url> {
    let trimmed = raw.trim();
    // Look for the scheme before dropping slashes, or "http://" would lose it.
    let candidate = match trimmed.split_once("://") {
        Some((_, authority)) if authority.trim_end_matches('/').is_empty() => return None,
        Some(_) => trimmed.trim_end_matches('/').to_string(),
        None => {
            let host = trimmed.trim_end_matches('/');
            if host.is_empty() {
                return None;
            }
            let scheme = if use_tls { "https" } else { "http" };
            format!("{scheme}://{host}")
        }
    };
    // A dangling port separator names no port.
    if candidate.ends_with(':') {
        return None;
    }

    let mut url = Url::parse(&candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if url.host_str().map_or(true, str::is_empty) {
        return None;
    }

    // Url hides scheme-default ports, so look at the authority itself.
    if url.port().is_none() && !has_explicit_port(&candidate) {
        let port = if use_tls { DEFAULT_TLS_API_PORT } else { DEFAULT_API_PORT };
        url.set_port(Some(port)).ok()?;
    }

    url.set_query(None);
    url.set_fragment(None);
    Some(url)
}

fn has_explicit_port(candidate: &str) -> bool {
    let authority = candidate
        .split_once("://")
        .map_or(candidate, |(_, rest)| rest)
        .split('/')
        .next()
        .unwrap_or_default();
    let host_port = authority.rsplit('@').next().unwrap_or(authority);
    // IPv6 literals carry colons inside brackets.
    let after_host = host_port.rsplit(']').next().unwrap_or(host_port);
    after_host.contains(':')
}
