//! Removal of headers injected by a known reverse proxy.
//!
//! When the service sits behind a proxy, every capture carries the proxy's own
//! `X-Forwarded-*` bookkeeping. If the configured proxy hostname shows up in
//! `X-Forwarded-Host`, that hostname is taken out of the list and the other
//! forwarding headers the proxy adds are dropped. Requests that did not come
//! through the proxy are left untouched.

use log::trace;

use super::types::HeaderList;

const FORWARDED_HOST: &str = "x-forwarded-host";

/// Dropped outright once the proxy has been recognised.
const PROXY_HEADERS: [&str; 4] = [
    "x-forwarded-port",
    "x-forwarded-proto",
    "x-forwarded-server",
    "x-real-ip",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHeaderFilter {
    hostname: String,
}

impl ProxyHeaderFilter {
    /// Returns `None` for a blank hostname.
    pub fn new(hostname: &str) -> Option<Self> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return None;
        }
        Some(Self {
            hostname: hostname.to_lowercase(),
        })
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn is_proxy_host(&self, host: &str) -> bool {
        host.trim().to_lowercase() == self.hostname
    }

    /// True when some `X-Forwarded-Host` header lists the proxy hostname.
    pub fn matches(&self, headers: &[(String, String)]) -> bool {
        headers.iter().any(|(name, value)| {
            name.eq_ignore_ascii_case(FORWARDED_HOST)
                && value.split(',').any(|host| self.is_proxy_host(host))
        })
    }

    /// Filters the ordered header list, keeping the order of what survives.
    pub fn apply(&self, headers: HeaderList) -> HeaderList {
        if !self.matches(&headers) {
            return headers;
        }

        let mut kept = Vec::with_capacity(headers.len());
        for (name, value) in headers {
            if PROXY_HEADERS
                .iter()
                .any(|proxy_header| name.eq_ignore_ascii_case(proxy_header))
            {
                trace!("Dropping proxy header {}", name);
                continue;
            }

            if name.eq_ignore_ascii_case(FORWARDED_HOST) {
                let remaining: Vec<&str> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|host| !host.is_empty() && !self.is_proxy_host(host))
                    .collect();
                if remaining.is_empty() {
                    trace!("Dropping {} after removing {}", name, self.hostname);
                    continue;
                }
                kept.push((name, remaining.join(", ")));
                continue;
            }

            kept.push((name, value));
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderList {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blank_hostname_disables_filter() {
        assert_eq!(ProxyHeaderFilter::new("   "), None);
        assert_eq!(
            ProxyHeaderFilter::new(" Edge.Example ").unwrap().hostname(),
            "edge.example"
        );
    }

    #[test]
    fn strips_proxy_host_and_forwarding_headers() {
        let filter = ProxyHeaderFilter::new("p").unwrap();
        let input = headers(&[
            ("Host", "service.local"),
            ("X-Forwarded-Host", "p, other.example"),
            ("X-Forwarded-Port", "443"),
            ("X-Forwarded-Proto", "https"),
            ("x-forwarded-server", "p"),
            ("X-Real-Ip", "10.0.0.1"),
            ("Accept", "*/*"),
        ]);

        assert_eq!(
            filter.apply(input),
            headers(&[
                ("Host", "service.local"),
                ("X-Forwarded-Host", "other.example"),
                ("Accept", "*/*"),
            ])
        );
    }

    #[test]
    fn drops_forwarded_host_when_only_proxy_remains() {
        let filter = ProxyHeaderFilter::new("Proxy.Example").unwrap();
        let input = headers(&[("x-forwarded-host", "PROXY.example"), ("x-real-ip", "1.2.3.4")]);
        assert!(filter.apply(input).is_empty());
    }

    #[test]
    fn leaves_requests_from_other_hosts_alone() {
        let filter = ProxyHeaderFilter::new("p").unwrap();
        let input = headers(&[
            ("X-Forwarded-Host", "proxy-two.example"),
            ("X-Forwarded-Proto", "http"),
        ]);
        assert_eq!(filter.apply(input.clone()), input);
    }

    #[test]
    fn keeps_duplicate_headers_in_order() {
        let filter = ProxyHeaderFilter::new("p").unwrap();
        let input = headers(&[
            ("Cookie", "a=1"),
            ("X-Forwarded-Host", "a.example,p,b.example"),
            ("Cookie", "b=2"),
        ]);
        assert_eq!(
            filter.apply(input),
            headers(&[
                ("Cookie", "a=1"),
                ("X-Forwarded-Host", "a.example, b.example"),
                ("Cookie", "b=2"),
            ])
        );
    }
}
