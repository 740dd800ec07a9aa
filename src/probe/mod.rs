//! Bulk SMTP deliverability probing.
//!
//! [`Verifier::verify`] resolves the recipient domain's MX hosts (plus the
//! conventional `mail.`/`smtp.` fallbacks), finds the first host that answers
//! a greeting, and runs a single `EHLO`/`MAIL FROM`/`RCPT TO` exchange whose
//! final reply is classified into a [`Verdict`]. [`Verifier::run_all`] does
//! the same for a whole list under a fixed concurrency limit.

mod classify;
mod dial;
mod dns;
mod error;
mod options;
mod scheduler;
mod sender;
mod session;
mod types;
mod verifier;

pub use classify::ResponseClassifier;
pub use dial::{Connection, ConnectionDialer, connect_request};
pub use dns::{DnsResolver, LookupMx, MxRecord, fallback_hosts, resolve_candidates};
pub use error::{InputError, ProbeError, SinkError};
pub use options::{
    BLACKLIST_MARKERS, DEFAULT_REGION_SUFFIX, FORBIDDEN_SERVER_MARKERS, FastPathRule, Phase,
    ProbeConfig, ProxySettings,
};
pub use scheduler::{Completed, run_bounded};
pub use sender::{SenderIdentity, SenderPool};
pub use session::{MailSession, read_reply};
pub use types::{Bucket, Outcome, ProbeReport, RunSummary, SmtpReply, Stage, Verdict};
pub use verifier::Verifier;
