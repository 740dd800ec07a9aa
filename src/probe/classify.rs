use crate::probe::error::ProbeError;
use crate::probe::options::ProbeConfig;
use crate::probe::types::{SmtpReply, Verdict};

/// Maps the final `RCPT TO` reply to a [`Verdict`].
#[derive(Debug, Clone, Default)]
pub struct ResponseClassifier {
    markers: Vec<String>,
    external_ip: Option<String>,
}

impl ResponseClassifier {
    pub fn new(markers: Vec<String>, external_ip: Option<String>) -> Self {
        Self {
            markers,
            external_ip: external_ip.filter(|ip| !ip.trim().is_empty()),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            config.blacklist_markers.clone(),
            config.external_ip_token().map(str::to_string),
        )
    }

    /// `250` accepts, `550` rejects (or blacklists when a marker shows up),
    /// `421 4.7.1` blacklists. Anything else is an error for the caller to
    /// fold.
    pub fn classify(&self, reply: &SmtpReply) -> Result<Verdict, ProbeError> {
        if reply.starts_with("250") {
            Ok(Verdict::Live)
        } else if reply.starts_with("550") {
            if self.mentions_blacklist(reply) {
                Ok(Verdict::Blacklisted)
            } else {
                Ok(Verdict::Die)
            }
        } else if reply.starts_with("421 4.7.1") {
            Ok(Verdict::Blacklisted)
        } else {
            Err(ProbeError::UnexpectedReply {
                reply: reply.summary(),
            })
        }
    }

    /// Same as [`classify`](Self::classify) with unrecognised replies counted
    /// as [`Verdict::Die`].
    pub fn classify_or_die(&self, reply: &SmtpReply) -> Verdict {
        match self.classify(reply) {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::debug!("{err}; counting as DIE");
                Verdict::Die
            }
        }
    }

    fn mentions_blacklist(&self, reply: &SmtpReply) -> bool {
        self.markers.iter().any(|marker| reply.contains(marker))
            || self
                .external_ip
                .as_deref()
                .is_some_and(|ip| reply.contains(ip))
    }
}
