use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

use crate::probe::error::ProbeError;
use crate::probe::sender::SenderIdentity;
use crate::probe::types::{SmtpReply, Stage};

const MAX_REPLY_LINES: usize = 512;

/// Reads one SMTP reply: lines up to and including the first whose fourth
/// byte is not `-`. Lines are kept verbatim, terminators included; bytes
/// that are not UTF-8 (Latin-1 banners) are decoded lossily.
pub async fn read_reply<R>(reader: &mut R) -> io::Result<SmtpReply>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    for _ in 0..MAX_REPLY_LINES {
        let start = raw.len();
        let read = reader.read_until(b'\n', &mut raw).await?;
        if read == 0 || raw.last() != Some(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed while reading reply",
            ));
        }
        let line = &raw[start..];
        if line.len() < 4 || line[3] != b'-' {
            return Ok(SmtpReply::new(String::from_utf8_lossy(&raw).into_owned()));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("reply longer than {MAX_REPLY_LINES} lines"),
    ))
}

/// One-shot SMTP dialogue over an established connection. No `QUIT` is sent;
/// dropping the session closes the socket.
pub struct MailSession<S> {
    stream: S,
    read_timeout: Option<Duration>,
    last_reply: Option<SmtpReply>,
}

impl<S> MailSession<S>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, read_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            read_timeout,
            last_reply: None,
        }
    }

    pub fn last_reply(&self) -> Option<&SmtpReply> {
        self.last_reply.as_ref()
    }

    pub async fn read_reply(&mut self, stage: Stage) -> Result<SmtpReply, ProbeError> {
        let reply = match self.read_timeout {
            Some(limit) => timeout(limit, read_reply(&mut self.stream))
                .await
                .map_err(|_| ProbeError::ReadTimeout { stage })?,
            None => read_reply(&mut self.stream).await,
        }
        .map_err(|err| ProbeError::protocol(stage, err))?;
        debug!("{stage} response: {}", reply.summary());
        self.last_reply = Some(reply.clone());
        Ok(reply)
    }

    pub async fn send_command(
        &mut self,
        command: &str,
        stage: Stage,
    ) -> Result<SmtpReply, ProbeError> {
        let line = format!("{command}\r\n");
        self.stream
            .write_all(line.as_bytes())
            .await
            .map_err(|err| ProbeError::protocol(stage, err))?;
        self.stream
            .flush()
            .await
            .map_err(|err| ProbeError::protocol(stage, err))?;
        self.read_reply(stage).await
    }

    /// Reads the greeting; success means the host is usable.
    pub async fn connection_test(&mut self) -> Result<SmtpReply, ProbeError> {
        self.read_reply(Stage::Greeting).await
    }

    /// Greeting, `EHLO`, `MAIL FROM`, `RCPT TO`. Only the `RCPT TO` reply is
    /// returned; earlier replies are read but not inspected.
    pub async fn full_handshake(
        &mut self,
        sender: &SenderIdentity,
        recipient: &str,
    ) -> Result<SmtpReply, ProbeError> {
        self.read_reply(Stage::Greeting).await?;
        self.send_command(&format!("EHLO {}", sender.domain), Stage::Ehlo)
            .await?;
        self.send_command(&format!("MAIL FROM:<{}>", sender.address), Stage::MailFrom)
            .await?;
        self.send_command(&format!("RCPT TO:<{recipient}>"), Stage::RcptTo)
            .await
    }
}
