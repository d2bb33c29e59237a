//! Hostname verification against a certificate's subject alternative names.
//!
//! Matching rules:
//! - comparison is ASCII case-insensitive and ignores one trailing dot on the host
//! - `*` is only a wildcard as the complete left-most label of a pattern and matches exactly
//!   one label
//! - a host that is not a well-formed hostname (for example a wildcard name itself) is compared
//!   to each pattern literally
//! - IP literals, optionally in brackets, are compared against IP address SANs only

use std::net::IpAddr;
use x509_parser::prelude::{GeneralName, X509Certificate};

/// Returns true if `host` is covered by the DNS or IP subject alternative names of `cert`.
///
/// A certificate without a SAN extension, or with one that fails to parse, matches nothing.
pub fn verify_hostname(cert: &X509Certificate<'_>, host: &str) -> bool {
    match cert.subject_alternative_name() {
        Ok(Some(san)) => verify_against_names(&san.value.general_names, host),
        _ => false,
    }
}

/// Returns true if `host` is covered by one of `names`.
pub fn verify_against_names(names: &[GeneralName<'_>], host: &str) -> bool {
    let unbracketed = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
    if let Ok(ip) = unbracketed.parse::<IpAddr>() {
        return names.iter().any(|name| match name {
            GeneralName::IPAddress(bytes) => ip_matches(bytes, &ip),
            _ => false,
        });
    }

    let candidate = host.to_ascii_lowercase();
    let valid_candidate = is_valid_hostname(&candidate, false);

    names
        .iter()
        .filter_map(|name| match name {
            GeneralName::DNSName(pattern) => Some(*pattern),
            _ => None,
        })
        .any(|pattern| {
            if valid_candidate && is_valid_hostname(pattern, true) {
                match_hostnames(pattern, &candidate)
            } else {
                match_exactly(pattern, &candidate)
            }
        })
}

fn ip_matches(san: &[u8], ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => san == v4.octets().as_slice(),
        IpAddr::V6(v6) => san == v6.octets().as_slice(),
    }
}

fn is_valid_hostname(host: &str, is_pattern: bool) -> bool {
    let host = if is_pattern { host } else { host.strip_suffix('.').unwrap_or(host) };
    if host.is_empty() || host == "*" {
        return false;
    }

    host.split('.').enumerate().all(|(i, label)| {
        if label.is_empty() {
            return false;
        }
        if is_pattern && i == 0 && label == "*" {
            return true;
        }
        label.bytes().enumerate().all(|(j, c)| {
            c.is_ascii_alphanumeric() || c == b'_' || (c == b'-' && j != 0)
        })
    })
}

fn match_exactly(pattern: &str, host: &str) -> bool {
    if pattern.is_empty() || pattern == "." || host.is_empty() || host == "." {
        return false;
    }
    pattern.eq_ignore_ascii_case(host)
}

fn match_hostnames(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.strip_suffix('.').unwrap_or(host);
    if pattern.is_empty() || host.is_empty() {
        return false;
    }

    let pattern_labels: Vec<&str> = pattern.split('.').collect();
    let host_labels: Vec<&str> = host.split('.').collect();
    if pattern_labels.len() != host_labels.len() {
        return false;
    }

    pattern_labels
        .iter()
        .zip(&host_labels)
        .enumerate()
        .all(|(i, (p, h))| (i == 0 && *p == "*") || p == h)
}
