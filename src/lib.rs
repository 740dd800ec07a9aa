#![forbid(unsafe_code)]
//! mailprobe_lib — vérification de délivrabilité par sonde SMTP (RCPT TO)

pub mod input;
pub mod probe;
pub mod sink;

pub use input::{load_addresses, load_lines, load_sender_domains};
pub use probe::{
    Bucket, ConnectionDialer, DnsResolver, FastPathRule, InputError, LookupMx, MailSession,
    Outcome, ProbeConfig, ProbeError, ProbeReport, ProxySettings, ResponseClassifier, RunSummary,
    SenderIdentity, SenderPool, SinkError, SmtpReply, Verdict, Verifier,
};
pub use sink::{FileSink, MemorySink, ResultSink};
