use std::future::Future;

use tracing::debug;
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveError;

use crate::probe::error::ProbeError;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MxRecord {
    pub preference: u16,
    pub exchange: String,
}

impl MxRecord {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// Source of MX records. Implemented by [`DnsResolver`] and by test stubs.
pub trait LookupMx: Send + Sync {
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, ResolveError>> + Send;
}

/// Async system resolver.
#[derive(Clone)]
pub struct DnsResolver {
    inner: TokioAsyncResolver,
}

impl DnsResolver {
    pub fn from_system_conf() -> Result<Self, ProbeError> {
        let inner = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|err| ProbeError::ResolverInit { source: err })?;
        Ok(Self { inner })
    }

    /// Public upstreams, for hosts without a usable `resolv.conf`.
    pub fn with_defaults() -> Self {
        Self {
            inner: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        }
    }
}

impl LookupMx for DnsResolver {
    fn lookup_mx(
        &self,
        domain: &str,
    ) -> impl Future<Output = Result<Vec<MxRecord>, ResolveError>> + Send {
        async move {
            let lookup = self.inner.mx_lookup(domain).await?;
            let mut records = Vec::new();
            for mx in lookup.iter() {
                let exchange = normalize_exchange(&mx.exchange().to_utf8());
                if exchange.is_empty() {
                    continue;
                }
                records.push(MxRecord::new(mx.preference(), exchange));
            }
            Ok(records)
        }
    }
}

/// Ordered probe candidates for `domain`: MX exchanges by ascending
/// preference (ties keep resolver order), then `mail.<domain>` and
/// `smtp.<domain>`. No de-duplication. A failed lookup yields no fallbacks.
pub async fn resolve_candidates<R: LookupMx>(
    resolver: &R,
    domain: &str,
) -> Result<Vec<String>, ProbeError> {
    let mut records = resolver
        .lookup_mx(domain)
        .await
        .map_err(|source| ProbeError::Lookup {
            domain: domain.to_string(),
            source,
        })?;
    records.sort_by_key(|record| record.preference);

    let mut hosts: Vec<String> = records.into_iter().map(|r| r.exchange).collect();
    debug!("{} MX record(s) for {domain}", hosts.len());
    hosts.extend(fallback_hosts(domain));
    Ok(hosts)
}

pub fn fallback_hosts(domain: &str) -> [String; 2] {
    [format!("mail.{domain}"), format!("smtp.{domain}")]
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, ProbeError> {
    idna::domain_to_ascii(domain.trim()).map_err(ProbeError::idna)
}

pub(crate) fn normalize_exchange(exchange: &str) -> String {
    exchange.trim_end_matches('.').to_ascii_lowercase()
}
