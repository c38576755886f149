//! Site resolution (eTLD+1 extraction) and host suffix walking
//!
//! A "schemeless site" is the registrable domain of a host. Resolution is
//! pluggable through [`SiteResolver`]; the built-in heuristic covers the
//! common two-part public suffixes and [`PublicSuffixResolver`] uses a
//! full public suffix list.
//!
//! # Examples
//!
//! ```
//! use cc_core::psl::{HeuristicSiteResolver, SiteResolver};
//!
//! let resolver = HeuristicSiteResolver;
//! assert_eq!(resolver.schemeless_site("sub.example.com"), "example.com");
//! assert_eq!(resolver.schemeless_site("sub.example.co.uk"), "example.co.uk");
//! ```

use std::fmt;

use publicsuffix::{List, Psl};

/// Derives the registrable domain of a host.
pub trait SiteResolver: Send + Sync {
    /// Return the registrable domain as a suffix slice of `host`.
    ///
    /// `host` must already be lowercase. Hosts without a registrable domain
    /// (IP literals, single labels, bare suffixes) resolve to themselves.
    fn schemeless_site<'a>(&self, host: &'a str) -> &'a str;
}

// =============================================================================
// Heuristic Resolver
// =============================================================================

/// Common two-part TLDs for fallback.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Resolver that needs no list: last two labels, or last three when the
/// host ends in a well-known two-part suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSiteResolver;

impl SiteResolver for HeuristicSiteResolver {
    fn schemeless_site<'a>(&self, host: &'a str) -> &'a str {
        let host = host.trim_end_matches('.');
        if is_ip_literal(host) {
            return host;
        }

        let two = match suffix_with_labels(host, 2) {
            Some(two) => two,
            None => return host,
        };

        if COMMON_TWO_PART_TLDS.contains(&two) {
            return suffix_with_labels(host, 3).unwrap_or(host);
        }

        two
    }
}

/// Return the trailing `count` labels of `host`, or `None` when the host
/// has no more labels than that.
fn suffix_with_labels(host: &str, count: usize) -> Option<&str> {
    let mut seen = 0;
    for (i, b) in host.bytes().enumerate().rev() {
        if b == b'.' {
            seen += 1;
            if seen == count {
                return Some(&host[i + 1..]);
            }
        }
    }
    None
}

fn is_ip_literal(host: &str) -> bool {
    host.starts_with('[') || host.parse::<std::net::Ipv4Addr>().is_ok()
}

// =============================================================================
// Public Suffix List Resolver
// =============================================================================

/// Error raised when public suffix list text cannot be parsed.
#[derive(Debug, thiserror::Error)]
#[error("invalid public suffix list: {0}")]
pub struct PslError(String);

/// Resolver backed by a full public suffix list.
pub struct PublicSuffixResolver {
    list: List,
}

impl PublicSuffixResolver {
    /// Parse `public_suffix_list.dat` text.
    pub fn from_text(text: &str) -> Result<Self, PslError> {
        let list: List = text.parse().map_err(|e| PslError(format!("{e:?}")))?;
        Ok(Self { list })
    }
}

impl fmt::Debug for PublicSuffixResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicSuffixResolver").finish_non_exhaustive()
    }
}

impl SiteResolver for PublicSuffixResolver {
    fn schemeless_site<'a>(&self, host: &'a str) -> &'a str {
        let host = host.trim_end_matches('.');
        if is_ip_literal(host) {
            return host;
        }
        match self.list.domain(host.as_bytes()) {
            Some(domain) => {
                let len = domain.as_bytes().len();
                if len > 0 && len <= host.len() {
                    &host[host.len() - len..]
                } else {
                    host
                }
            }
            None => host,
        }
    }
}

// =============================================================================
// Suffix Walking
// =============================================================================

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator over a host and each of its parent domains.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result);
        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
///
/// `ads.tracker.example` yields `ads.tracker.example`, `tracker.example`,
/// `example`.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    let host = host.trim_end_matches('.');
    HostSuffixIter {
        current: (!host.is_empty()).then_some(host),
    }
}

/// True when `host` equals `domain` or is a subdomain of it.
#[inline]
pub fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}
