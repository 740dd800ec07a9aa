use std::sync::{Arc, Mutex, PoisonError};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::probe::classify::ResponseClassifier;
use crate::probe::dial::ConnectionDialer;
use crate::probe::dns::{LookupMx, normalize_domain, resolve_candidates};
use crate::probe::error::ProbeError;
use crate::probe::options::{Phase, ProbeConfig};
use crate::probe::scheduler::run_bounded;
use crate::probe::sender::SenderPool;
use crate::probe::session::MailSession;
use crate::probe::types::{Bucket, Outcome, ProbeReport, RunSummary, SmtpReply};
use crate::sink::ResultSink;

/// Runs the whole pipeline for one address at a time and files the result.
pub struct Verifier<R, K> {
    config: ProbeConfig,
    resolver: R,
    sink: K,
    dialer: ConnectionDialer,
    classifier: ResponseClassifier,
    senders: SenderPool,
    rng: Mutex<StdRng>,
}

impl<R, K> Verifier<R, K>
where
    R: LookupMx,
    K: ResultSink,
{
    pub fn new(config: ProbeConfig, resolver: R, sink: K, senders: SenderPool) -> Self {
        Self {
            dialer: ConnectionDialer::from_config(&config),
            classifier: ResponseClassifier::from_config(&config),
            config,
            resolver,
            sink,
            senders,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Makes sender selection reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    /// Probes `address` and appends exactly one terminal record to its
    /// bucket (none for malformed input). Sink failures are logged only.
    pub async fn verify(&self, address: &str) -> ProbeReport {
        let report = self.evaluate(address).await;
        match report.outcome {
            Outcome::Invalid => debug!("Invalid email format: {address}"),
            _ => info!("{report}"),
        }
        if let Some(bucket) = report.outcome.bucket() {
            self.store(&bucket, &report.record_line()).await;
        }
        report
    }

    async fn evaluate(&self, address: &str) -> ProbeReport {
        let parts: Vec<&str> = address.split('@').collect();
        if parts.len() != 2 {
            return ProbeReport::new(address, Outcome::Invalid).with_error(
                ProbeError::InvalidAddress {
                    address: address.to_string(),
                },
            );
        }

        let domain = match normalize_domain(parts[1]) {
            Ok(domain) => domain,
            Err(err) => return ProbeReport::new(address, Outcome::UnknownServer).with_error(err),
        };

        if let Some(rule) = self.config.fast_path_for(&domain) {
            return ProbeReport::new(
                address,
                Outcome::FastPath {
                    label: rule.label.clone(),
                    bucket: rule.bucket.clone(),
                },
            );
        }

        let candidates = match resolve_candidates(&self.resolver, &domain).await {
            Ok(hosts) => hosts,
            Err(err) => {
                debug!("Error getting MX records: {err}");
                return ProbeReport::new(address, Outcome::UnknownServer).with_error(err);
            }
        };

        let Some((server, port)) = self.find_working_server(&candidates).await else {
            return ProbeReport::new(address, Outcome::UnknownServer);
        };

        let record = format!("{address} - {server}");
        if self.config.is_forbidden_server(&record) {
            return ProbeReport::new(address, Outcome::ForbiddenServer).with_server(server, port);
        }

        if self.config.stop_after_reachability {
            return ProbeReport::new(address, Outcome::Reachable).with_server(server, port);
        }
        self.store(&Bucket::REACHABLE, address).await;

        debug!("Using server {server} on port {port} to verify {address}");
        match self.handshake(address, &server, port).await {
            Ok(reply) => {
                let verdict = self.classifier.classify_or_die(&reply);
                ProbeReport::new(address, Outcome::Classified(verdict))
                    .with_server(server, port)
                    .with_reply(reply)
            }
            Err(err) => {
                debug!("verification of {address} via {server} failed: {err}");
                ProbeReport::new(address, Outcome::ConnectionError)
                    .with_server(server, port)
                    .with_error(err)
            }
        }
    }

    /// First `(host, port)` in candidate order that accepts a connection and
    /// sends a greeting.
    async fn find_working_server(&self, candidates: &[String]) -> Option<(String, u16)> {
        for host in candidates {
            for &port in &self.config.ports {
                debug!("Testing connection to {host} on port {port}...");
                match self.connection_test(host, port).await {
                    Ok(()) => {
                        debug!("Successfully connected to {host} on port {port}");
                        return Some((host.clone(), port));
                    }
                    Err(err) => debug!("Error: {err}"),
                }
            }
        }
        None
    }

    async fn connection_test(&self, host: &str, port: u16) -> Result<(), ProbeError> {
        let conn = self
            .dialer
            .dial_for(&self.config, Phase::ConnectionTest, host, port)
            .await?;
        let mut session = MailSession::new(conn, self.config.read_timeout);
        session.connection_test().await?;
        Ok(())
    }

    async fn handshake(
        &self,
        address: &str,
        server: &str,
        port: u16,
    ) -> Result<SmtpReply, ProbeError> {
        let sender = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.senders.draw(&mut *rng)?
        };
        debug!("From address: {}", sender.address);
        let conn = self
            .dialer
            .dial_for(&self.config, Phase::FullVerification, server, port)
            .await?;
        let mut session = MailSession::new(conn, self.config.read_timeout);
        session.full_handshake(&sender, address).await
    }

    async fn store(&self, bucket: &Bucket, line: &str) {
        if let Err(err) = self.sink.record(bucket, line).await {
            warn!("Error saving email: {err}");
        }
    }
}

impl<R, K> Verifier<R, K>
where
    R: LookupMx + 'static,
    K: ResultSink + 'static,
{
    /// Verifies every address with at most `config.concurrency` probes in
    /// flight and returns once all of them finished.
    pub async fn run_all(self: Arc<Self>, addresses: Vec<String>) -> RunSummary {
        let limit = self.config.concurrency;
        let done = run_bounded(addresses, limit, |address: String| {
            let verifier = Arc::clone(&self);
            async move { verifier.verify(&address).await }
        })
        .await;

        let mut summary = RunSummary::default();
        for report in &done.outputs {
            summary.add(report);
        }
        for (address, err) in &done.lost {
            error!("{address} - probe task failed: {err}");
            self.store(&Bucket::ERROR, address).await;
        }
        summary.total += done.lost.len();
        summary.aborted = done.lost.len();
        summary
    }
}
