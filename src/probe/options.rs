use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::probe::types::Bucket;

/// Substrings of a `550` reply that point at a blacklist provider rather than
/// a missing mailbox. Matching is case-sensitive.
pub const BLACKLIST_MARKERS: &[&str] = &[
    "spfbl",
    "banned",
    "spamhaus",
    "blocked",
    "dnsbl",
    "spamrats",
    "barracuda",
    "invaluement",
    "junke",
    "redhawk",
    "sorbs",
    "spamcop",
];

/// Substrings of `"<address> - <server>"` that route an address to the
/// forbidden-servers bucket before any handshake.
pub const FORBIDDEN_SERVER_MARKERS: &[&str] = &[
    "barracuda",
    "spam",
    "abuse",
    "blacklist",
    "block",
    "dnsbl",
    "spamhaus",
    "sorbs",
    "spamrats",
    "invaluement",
    "redhawk",
    "junke",
    "banned",
    "blocked",
    "spfbl",
    "spamcop",
    "backlist",
];

pub const DEFAULT_REGION_SUFFIX: &str = "-zone-resi-region-br";

/// Which connection a dial belongs to; each phase has its own proxy toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ConnectionTest,
    FullVerification,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionTest => "connection test",
            Self::FullVerification => "full verification",
        }
    }
}

/// HTTP forward proxy reached through `CONNECT`.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Appended to `username` before it is sent.
    pub region_suffix: String,
}

impl ProxySettings {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            region_suffix: DEFAULT_REGION_SUFFIX.to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// `user<suffix>:password`, before base64.
    pub fn credentials(&self) -> String {
        format!(
            "{}{}:{}",
            self.username, self.region_suffix, self.password
        )
    }
}

/// Domain that is filed straight into its own bucket without probing.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastPathRule {
    pub domain: String,
    pub label: String,
    pub bucket: Bucket,
}

impl FastPathRule {
    pub fn new(domain: impl Into<String>, label: impl Into<String>, bucket: Bucket) -> Self {
        Self {
            domain: domain.into(),
            label: label.into(),
            bucket,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("ig.com.br", "IG", Bucket::new("IG.txt")),
            Self::new("terra.com.br", "TERRA", Bucket::new("Terra.txt")),
        ]
    }
}

/// Immutable settings shared by every probe of a run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub proxy_for_connection_test: bool,
    pub proxy_for_full_verification: bool,
    pub proxy: Option<ProxySettings>,
    /// Extra blacklist marker, usually the public IP the probes leave from.
    pub external_ip: Option<String>,
    pub ports: Vec<u16>,
    pub connect_timeout: Duration,
    /// Deadline for each reply; `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub blacklist_markers: Vec<String>,
    pub forbidden_server_markers: Vec<String>,
    pub fast_paths: Vec<FastPathRule>,
    /// Record reachable candidates and stop before `EHLO`.
    pub stop_after_reachability: bool,
    pub concurrency: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            proxy_for_connection_test: false,
            proxy_for_full_verification: false,
            proxy: None,
            external_ip: None,
            ports: vec![25],
            connect_timeout: Duration::from_secs(10),
            read_timeout: Some(Duration::from_secs(30)),
            blacklist_markers: BLACKLIST_MARKERS.iter().map(|m| m.to_string()).collect(),
            forbidden_server_markers: FORBIDDEN_SERVER_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            fast_paths: FastPathRule::defaults(),
            stop_after_reachability: false,
            concurrency: 10,
        }
    }
}

impl ProbeConfig {
    pub fn uses_proxy(&self, phase: Phase) -> bool {
        match phase {
            Phase::ConnectionTest => self.proxy_for_connection_test,
            Phase::FullVerification => self.proxy_for_full_verification,
        }
    }

    /// Fast paths only apply while full verification runs direct.
    pub fn fast_path_for(&self, domain: &str) -> Option<&FastPathRule> {
        if self.proxy_for_full_verification {
            return None;
        }
        self.fast_paths.iter().find(|rule| rule.domain == domain)
    }

    /// The external IP marker, ignoring an empty value so it cannot match
    /// every reply.
    pub fn external_ip_token(&self) -> Option<&str> {
        self.external_ip
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn is_forbidden_server(&self, record: &str) -> bool {
        self.forbidden_server_markers
            .iter()
            .any(|marker| record.contains(marker.as_str()))
    }
}
