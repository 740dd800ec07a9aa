use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::probe::error::ProbeError;
use crate::probe::options::{Phase, ProbeConfig, ProxySettings};

/// An open byte stream to an SMTP server. The buffer carries over any bytes
/// the proxy handshake read past its header block.
pub type Connection = BufReader<TcpStream>;

const MAX_PROXY_HEADER_BYTES: usize = 16 * 1024;

/// Opens connections either directly or through an HTTP `CONNECT` tunnel.
#[derive(Debug, Clone)]
pub struct ConnectionDialer {
    proxy: Option<ProxySettings>,
    connect_timeout: Duration,
    read_timeout: Option<Duration>,
}

impl ConnectionDialer {
    pub fn new(
        proxy: Option<ProxySettings>,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
    ) -> Self {
        Self {
            proxy,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            config.proxy.clone(),
            config.connect_timeout,
            config.read_timeout,
        )
    }

    /// Dials `host:port` the way `phase` is configured to.
    pub async fn dial_for(
        &self,
        config: &ProbeConfig,
        phase: Phase,
        host: &str,
        port: u16,
    ) -> Result<Connection, ProbeError> {
        if !config.uses_proxy(phase) {
            return self.dial(host, port, false).await;
        }
        if self.proxy.is_none() {
            return Err(ProbeError::ProxyMissing {
                phase: phase.as_str(),
            });
        }
        self.dial(host, port, true).await
    }

    pub async fn dial(
        &self,
        host: &str,
        port: u16,
        use_proxy: bool,
    ) -> Result<Connection, ProbeError> {
        match (&self.proxy, use_proxy) {
            (Some(proxy), true) => self.dial_via_proxy(proxy, host, port).await,
            (None, true) => Err(ProbeError::ProxyMissing { phase: "dial" }),
            (_, false) => self.dial_direct(host, port).await,
        }
    }

    async fn dial_direct(&self, host: &str, port: u16) -> Result<Connection, ProbeError> {
        let stream = timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ProbeError::ConnectTimeout {
                host: host.to_string(),
                port,
            })?
            .map_err(|source| ProbeError::Connect {
                host: host.to_string(),
                port,
                source,
            })?;
        debug!("connected to {host}:{port}");
        Ok(BufReader::new(stream))
    }

    async fn dial_via_proxy(
        &self,
        proxy: &ProxySettings,
        host: &str,
        port: u16,
    ) -> Result<Connection, ProbeError> {
        let endpoint = proxy.endpoint();
        let stream = timeout(self.connect_timeout, TcpStream::connect(endpoint.as_str()))
            .await
            .map_err(|_| ProbeError::ProxyConnect {
                proxy: endpoint.clone(),
                source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
            })?
            .map_err(|source| ProbeError::ProxyConnect {
                proxy: endpoint.clone(),
                source,
            })?;
        let mut conn = BufReader::new(stream);

        let request = connect_request(host, port, proxy);
        conn.get_mut()
            .write_all(request.as_bytes())
            .await
            .map_err(|err| {
                ProbeError::ProxyResponse(format!("could not write connect request: {err}"))
            })?;

        // Dropping `conn` on any error below closes the proxy socket.
        let status = match self.read_timeout {
            Some(limit) => timeout(limit, read_connect_response(&mut conn))
                .await
                .map_err(|_| ProbeError::ProxyResponse("timed out".to_string()))??,
            None => read_connect_response(&mut conn).await?,
        };
        debug!("proxy {endpoint} tunnelled to {host}:{port}: {status}");
        Ok(conn)
    }
}

pub fn connect_request(host: &str, port: u16, proxy: &ProxySettings) -> String {
    let auth = STANDARD.encode(proxy.credentials());
    format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\nProxy-Authorization: Basic {auth}\r\n\r\n"
    )
}

async fn read_proxy_line(conn: &mut Connection, line: &mut Vec<u8>) -> Result<usize, ProbeError> {
    line.clear();
    conn.read_until(b'\n', line)
        .await
        .map_err(|err| ProbeError::ProxyResponse(err.to_string()))
}

/// Reads the status line and headers of a `CONNECT` response and returns
/// the status line. Fails unless the status is 200 and the header block
/// ends with a blank line within [`MAX_PROXY_HEADER_BYTES`].
async fn read_connect_response(conn: &mut Connection) -> Result<String, ProbeError> {
    let mut line = Vec::new();
    if read_proxy_line(conn, &mut line).await? == 0 {
        return Err(ProbeError::ProxyResponse(
            "proxy closed the connection".to_string(),
        ));
    }
    let status_line = String::from_utf8_lossy(&line).trim_end().to_string();
    let code = parse_status_code(&status_line)?;

    let mut budget = MAX_PROXY_HEADER_BYTES;
    loop {
        let read = read_proxy_line(conn, &mut line).await?;
        if read == 0 {
            return Err(ProbeError::ProxyResponse(
                "proxy closed the connection inside the header block".to_string(),
            ));
        }
        if line.trim_ascii().is_empty() {
            break;
        }
        budget = budget.checked_sub(read).ok_or_else(|| {
            ProbeError::ProxyResponse(format!(
                "header block larger than {MAX_PROXY_HEADER_BYTES} bytes"
            ))
        })?;
    }

    if code != 200 {
        return Err(ProbeError::ProxyRejected {
            status: status_line
                .split_once(' ')
                .map(|(_, rest)| rest.to_string())
                .unwrap_or(status_line),
        });
    }
    Ok(status_line)
}

fn parse_status_code(status_line: &str) -> Result<u16, ProbeError> {
    let mut parts = status_line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(ProbeError::ProxyResponse(format!(
            "malformed status line: {status_line}"
        )));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| ProbeError::ProxyResponse(format!("malformed status line: {status_line}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn spawn_proxy(
        response: impl AsRef<[u8]> + Send + 'static,
    ) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind proxy");
        let port = listener.local_addr().expect("addr").port();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut request = Vec::new();
            let mut buf = [0u8; 256];
            while !request.ends_with(b"\r\n\r\n") {
                let n = stream.read(&mut buf).await.expect("read request");
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_ref()).await.expect("respond");
            // Wait for the client to hang up.
            let _ = stream.read(&mut buf).await;
            String::from_utf8(request).expect("utf8 request")
        });
        (port, handle)
    }

    fn dialer(proxy_port: u16) -> ConnectionDialer {
        ConnectionDialer::new(
            Some(ProxySettings::new("127.0.0.1", proxy_port, "alice", "s3cret")),
            Duration::from_secs(5),
            Some(Duration::from_secs(5)),
        )
    }

    #[test]
    fn connect_request_carries_basic_auth() {
        let proxy = ProxySettings::new("proxy.local", 3128, "alice", "s3cret");
        let request = connect_request("mx.example.com", 25, &proxy);
        let expected_auth = STANDARD.encode("alice-zone-resi-region-br:s3cret");
        assert_eq!(
            request,
            format!(
                "CONNECT mx.example.com:25 HTTP/1.1\r\nHost: mx.example.com:25\r\nProxy-Authorization: Basic {expected_auth}\r\n\r\n"
            )
        );
    }

    #[test]
    fn status_code_parsing() {
        assert_eq!(
            parse_status_code("HTTP/1.1 200 Connection established").expect("ok"),
            200
        );
        assert!(parse_status_code("SSH-2.0-OpenSSH").is_err());
        assert!(parse_status_code("HTTP/1.1 abc").is_err());
    }

    #[tokio::test]
    async fn tunnel_keeps_bytes_after_headers() {
        let (port, proxy) =
            spawn_proxy("HTTP/1.1 200 Connection established\r\n\r\n220 mx ready\r\n").await;
        let mut conn = dialer(port)
            .dial("mx.example.com", 25, true)
            .await
            .expect("tunnel established");
        let mut greeting = String::new();
        conn.read_line(&mut greeting).await.expect("greeting");
        assert_eq!(greeting, "220 mx ready\r\n");
        drop(conn);

        let request = proxy.await.expect("proxy task");
        assert!(request.starts_with("CONNECT mx.example.com:25 HTTP/1.1\r\n"));
        assert!(request.contains("Proxy-Authorization: Basic "));
    }

    #[tokio::test]
    async fn non_200_status_fails_and_closes() {
        let (port, proxy) =
            spawn_proxy("HTTP/1.1 407 Proxy Authentication Required\r\nProxy-Authenticate: Basic\r\n\r\n")
                .await;
        let err = dialer(port)
            .dial("mx.example.com", 25, true)
            .await
            .expect_err("407 must fail");
        match err {
            ProbeError::ProxyRejected { status } => {
                assert_eq!(status, "407 Proxy Authentication Required")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The proxy's trailing read only returns once our side is closed.
        tokio::time::timeout(Duration::from_secs(5), proxy)
            .await
            .expect("socket closed")
            .expect("proxy task");
    }

    #[tokio::test]
    async fn latin1_status_reason_is_accepted() {
        let (port, proxy) =
            spawn_proxy(b"HTTP/1.1 200 Conex\xe3o estabelecida\r\nVia: proxy\r\n\r\n220 mx ready\r\n")
                .await;
        let mut conn = dialer(port)
            .dial("mx.example.com", 25, true)
            .await
            .expect("tunnel established");
        let mut greeting = String::new();
        conn.read_line(&mut greeting).await.expect("greeting");
        assert_eq!(greeting, "220 mx ready\r\n");
        drop(conn);
        proxy.await.expect("proxy task");
    }

    #[tokio::test]
    async fn oversized_header_block_is_rejected() {
        let mut response = String::from("HTTP/1.1 200 Connection established\r\n");
        for _ in 0..2000 {
            response.push_str("X-Pad: aaaaaaaaaa\r\n");
        }
        response.push_str("\r\n220 mx ready\r\n");
        let (port, _proxy) = spawn_proxy(response).await;
        let err = dialer(port)
            .dial("mx.example.com", 25, true)
            .await
            .expect_err("header block exceeds the budget");
        assert!(matches!(err, ProbeError::ProxyResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unterminated_header_block_times_out() {
        let (port, _proxy) = spawn_proxy("HTTP/1.1 200 Connection established\r\nVia: proxy\r\n").await;
        let dialer = ConnectionDialer::new(
            Some(ProxySettings::new("127.0.0.1", port, "alice", "s3cret")),
            Duration::from_secs(5),
            Some(Duration::from_millis(200)),
        );
        let err = dialer
            .dial("mx.example.com", 25, true)
            .await
            .expect_err("no blank line");
        assert!(matches!(err, ProbeError::ProxyResponse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn proxy_flag_without_settings_is_an_error() {
        let dialer = ConnectionDialer::new(None, Duration::from_secs(1), None);
        let mut config = ProbeConfig::default();
        config.proxy_for_connection_test = true;
        let err = dialer
            .dial_for(&config, Phase::ConnectionTest, "mx.example.com", 25)
            .await
            .expect_err("no proxy configured");
        assert!(matches!(err, ProbeError::ProxyMissing { .. }));
    }

    #[tokio::test]
    async fn refused_direct_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        let dialer = ConnectionDialer::new(None, Duration::from_secs(5), None);
        let err = dialer
            .dial("127.0.0.1", port, false)
            .await
            .expect_err("nothing listens");
        assert!(matches!(err, ProbeError::Connect { .. }));
    }
}
