use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use streaming::PARTS_LIBRARY_HOST;

/// Allow-list entry that lets the proxy contact any host.
pub const ANY_HOST: &str = "*";

#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub addr: SocketAddr,
    pub upstream_timeout_s: u64,
    /// `max-age` for relayed part files.
    pub ldr_max_age_s: u32,
    /// Upstream hosts the proxy may contact. Defaults to the parts library
    /// CDN; `*` allows any host and an empty list allows none.
    pub allowed_hosts: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 9200)),
            upstream_timeout_s: 20,
            ldr_max_age_s: 3600,
            allowed_hosts: vec![PARTS_LIBRARY_HOST.to_string()],
        }
    }
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addr: env_var_or("PROXY_ADDR", defaults.addr),
            upstream_timeout_s: env_var_or("PROXY_UPSTREAM_TIMEOUT_S", defaults.upstream_timeout_s),
            ldr_max_age_s: env_var_or("PROXY_LDR_MAX_AGE_S", defaults.ldr_max_age_s),
            allowed_hosts: env::var("PROXY_ALLOWED_HOSTS")
                .ok()
                .map(|v| parse_host_list(&v))
                .filter(|hosts| !hosts.is_empty())
                .unwrap_or(defaults.allowed_hosts),
        }
    }

    pub fn host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|h| h == ANY_HOST || h.eq_ignore_ascii_case(host))
    }
}

fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{parse_host_list, ProxyConfig, ANY_HOST};

    #[test]
    fn host_list_ignores_blanks() {
        assert_eq!(
            parse_host_list(" cdn.jsdelivr.net, ,library.ldraw.org "),
            vec!["cdn.jsdelivr.net", "library.ldraw.org"]
        );
    }

    #[test]
    fn default_allows_only_the_parts_cdn() {
        let cfg = ProxyConfig::default();
        assert!(cfg.host_allowed("CDN.jsdelivr.net"));
        assert!(!cfg.host_allowed("evil.example"));
        assert!(!cfg.host_allowed("169.254.169.254"));
    }

    #[test]
    fn wildcard_is_an_explicit_opt_in() {
        let mut cfg = ProxyConfig {
            allowed_hosts: vec![ANY_HOST.to_string()],
            ..ProxyConfig::default()
        };
        assert!(cfg.host_allowed("anything.example"));
        cfg.allowed_hosts.clear();
        assert!(!cfg.host_allowed("cdn.jsdelivr.net"));
    }
}
