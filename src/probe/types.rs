use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Step of the SMTP dialogue a reply or failure belongs to.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Greeting,
    Ehlo,
    MailFrom,
    RcptTo,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greeting => f.write_str("greeting"),
            Self::Ehlo => f.write_str("EHLO"),
            Self::MailFrom => f.write_str("MAIL FROM"),
            Self::RcptTo => f.write_str("RCPT TO"),
        }
    }
}

/// A raw SMTP reply: every line read, terminators included, concatenated in
/// arrival order.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub text: String,
}

impl SmtpReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.text.starts_with(prefix)
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    /// Single-line rendering for logs.
    pub fn summary(&self) -> String {
        self.text
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

/// Verdict derived from the final `RCPT TO` reply.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The mailbox was accepted.
    Live,
    /// The mailbox was rejected for a reason other than a blacklist listing.
    Die,
    /// The probe itself was refused (blacklist provider or policy block).
    Blacklisted,
}

/// Name of an append-only result file. Buckets are plain data so fast-path
/// rules can bring their own.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket(Cow<'static, str>);

impl Bucket {
    pub const LIVE: Bucket = Bucket(Cow::Borrowed("LIVE.txt"));
    pub const DIE: Bucket = Bucket(Cow::Borrowed("DIE.txt"));
    pub const BLACKLISTED: Bucket = Bucket(Cow::Borrowed("Backlistip.txt"));
    pub const UNKNOWN: Bucket = Bucket(Cow::Borrowed("Unknow.txt"));
    pub const ERROR: Bucket = Bucket(Cow::Borrowed("Error.txt"));
    pub const FORBIDDEN_SERVERS: Bucket = Bucket(Cow::Borrowed("Servidores_proibidos.txt"));
    pub const REACHABLE: Bucket = Bucket(Cow::Borrowed("Emails_validos.txt"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal state of one address.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Not of the form `local@domain`; logged only.
    Invalid,
    /// Domain matched a fast-path rule and was never probed.
    FastPath { label: String, bucket: Bucket },
    /// DNS failed or no candidate host answered a greeting.
    UnknownServer,
    /// The `"<address> - <server>"` record matched a forbidden marker.
    ForbiddenServer,
    /// A candidate answered; the handshake was skipped on purpose.
    Reachable,
    /// Dial or protocol failure during the full handshake.
    ConnectionError,
    Classified(Verdict),
}

impl Outcome {
    pub fn label(&self) -> &str {
        match self {
            Self::Invalid => "INVALID",
            Self::FastPath { label, .. } => label,
            Self::UnknownServer => "UNKNOWN",
            Self::ForbiddenServer => "FORBIDDEN",
            Self::Reachable => "VALID",
            Self::ConnectionError => "ERROR",
            Self::Classified(Verdict::Live) => "LIVE",
            Self::Classified(Verdict::Die) => "DIE",
            Self::Classified(Verdict::Blacklisted) => "BLACKLIST",
        }
    }

    /// Bucket receiving the terminal record; `None` only for invalid input.
    pub fn bucket(&self) -> Option<Bucket> {
        match self {
            Self::Invalid => None,
            Self::FastPath { bucket, .. } => Some(bucket.clone()),
            Self::UnknownServer => Some(Bucket::UNKNOWN),
            Self::ForbiddenServer => Some(Bucket::FORBIDDEN_SERVERS),
            Self::Reachable => Some(Bucket::REACHABLE),
            Self::ConnectionError => Some(Bucket::ERROR),
            Self::Classified(Verdict::Live) => Some(Bucket::LIVE),
            Self::Classified(Verdict::Die) => Some(Bucket::DIE),
            Self::Classified(Verdict::Blacklisted) => Some(Bucket::BLACKLISTED),
        }
    }
}

/// What the verifier concluded for one address.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub address: String,
    pub outcome: Outcome,
    pub server: Option<String>,
    pub port: Option<u16>,
    pub reply: Option<SmtpReply>,
    pub error: Option<String>,
}

impl ProbeReport {
    pub fn new(address: impl Into<String>, outcome: Outcome) -> Self {
        Self {
            address: address.into(),
            outcome,
            server: None,
            port: None,
            reply: None,
            error: None,
        }
    }

    pub fn with_server(mut self, server: impl Into<String>, port: u16) -> Self {
        self.server = Some(server.into());
        self.port = Some(port);
        self
    }

    pub fn with_reply(mut self, reply: SmtpReply) -> Self {
        self.reply = Some(reply);
        self
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Line appended to the outcome bucket. Forbidden-server records keep the
    /// server so the match can be audited.
    pub fn record_line(&self) -> String {
        match (&self.outcome, &self.server) {
            (Outcome::ForbiddenServer, Some(server)) => format!("{} - {server}", self.address),
            _ => self.address.clone(),
        }
    }
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.address, self.outcome.label())?;
        if let Some(server) = &self.server {
            write!(f, " - {server}")?;
        }
        Ok(())
    }
}

/// Per-outcome tally of a finished run.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub by_outcome: BTreeMap<String, usize>,
    /// Addresses whose task panicked; filed under the error bucket and
    /// included in `total`.
    pub aborted: usize,
}

impl RunSummary {
    pub fn add(&mut self, report: &ProbeReport) {
        self.total += 1;
        *self
            .by_outcome
            .entry(report.outcome.label().to_string())
            .or_default() += 1;
    }

    pub fn count(&self, label: &str) -> usize {
        self.by_outcome.get(label).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_record_keeps_server() {
        let report = ProbeReport::new("a@b.com", Outcome::ForbiddenServer)
            .with_server("spam.b.com", 25);
        assert_eq!(report.record_line(), "a@b.com - spam.b.com");

        let live = ProbeReport::new("a@b.com", Outcome::Classified(Verdict::Live))
            .with_server("mx.b.com", 25);
        assert_eq!(live.record_line(), "a@b.com");
        assert_eq!(live.to_string(), "a@b.com - LIVE - mx.b.com");
    }

    #[test]
    fn every_outcome_but_invalid_has_a_bucket() {
        assert!(Outcome::Invalid.bucket().is_none());
        assert_eq!(Outcome::UnknownServer.bucket(), Some(Bucket::UNKNOWN));
        assert_eq!(
            Outcome::Classified(Verdict::Blacklisted).bucket(),
            Some(Bucket::BLACKLISTED)
        );
    }
}
