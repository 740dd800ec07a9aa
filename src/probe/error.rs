use std::path::PathBuf;

use thiserror::Error;

use crate::probe::types::Stage;

/// Per-address failures. None of them abort a run: the verifier folds each
/// one into exactly one bucket record.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid email address: {address}")]
    InvalidAddress { address: String },
    #[error("domain normalisation failed: {0}")]
    Idna(String),
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("could not get MX records for {domain}: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("could not connect to {host} on port {port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("connection to {host} on port {port} timed out")]
    ConnectTimeout { host: String, port: u16 },
    #[error("could not reach proxy {proxy}: {source}")]
    ProxyConnect {
        proxy: String,
        #[source]
        source: std::io::Error,
    },
    #[error("proxy requested for {phase} but no proxy is configured")]
    ProxyMissing { phase: &'static str },
    #[error("connect request failed: {status}")]
    ProxyRejected { status: String },
    #[error("could not read connect response: {0}")]
    ProxyResponse(String),
    #[error("could not complete {stage} exchange: {source}")]
    Protocol {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },
    #[error("no reply to {stage} before the read deadline")]
    ReadTimeout { stage: Stage },
    #[error("unexpected response: {reply}")]
    UnexpectedReply { reply: String },
    #[error("no sender domain available")]
    EmptySenderPool,
}

impl ProbeError {
    pub fn idna<T: std::fmt::Display>(err: T) -> Self {
        Self::Idna(err.to_string())
    }

    pub(crate) fn protocol(stage: Stage, source: std::io::Error) -> Self {
        Self::Protocol { stage, source }
    }

}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("could not open bucket {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not write to bucket {bucket}: {source}")]
    Write {
        bucket: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} contains no usable entries")]
    Empty { path: PathBuf },
}
