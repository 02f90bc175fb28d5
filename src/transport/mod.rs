//! Transport layer for SMTP connections.
//!
//! A transport owns exactly one socket for the lifetime of one send. It
//! offers a line-oriented write and a reply read; the caller must pair every
//! write with one read before issuing the next (no pipelining).

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::{ServerCredentials, TlsMode};
use crate::errors::{SmtpError, SmtpResult};
use crate::protocol::SmtpResponse;

/// Upper bound on lines in one reply, guarding against a server that never
/// sends the final line of a multi-line reply.
pub const MAX_REPLY_LINES: usize = 128;

/// Upper bound on bytes in one reply line, terminator included.
pub const MAX_REPLY_LINE_LEN: usize = 4096;

/// Trait for SMTP transport abstraction.
#[async_trait]
pub trait SmtpTransport: Send + fmt::Debug {
    /// Writes `line` followed by CRLF.
    async fn send_line(&mut self, line: &str) -> SmtpResult<()>;

    /// Reads one complete server reply.
    async fn read_response(&mut self) -> SmtpResult<SmtpResponse>;

    /// Releases the connection. Sends no SMTP commands. Idempotent.
    async fn close(&mut self) -> SmtpResult<()>;

    /// Returns true once the connection has been released.
    fn is_closed(&self) -> bool;
}

/// TCP connection, TLS-wrapped unless configured otherwise.
pub struct TcpTransport {
    /// Read/write stream; `None` once closed.
    stream: Option<TransportStream>,
    /// Command timeout.
    command_timeout: Duration,
    /// Server address, for diagnostics.
    address: String,
    /// TLS enabled flag.
    tls_enabled: bool,
}

/// Stream type that can be plain TCP or TLS.
enum TransportStream {
    Plain(BufReader<TcpStream>),
    #[cfg(feature = "rustls-tls")]
    Tls(BufReader<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("address", &self.address)
            .field("tls_enabled", &self.tls_enabled)
            .field("closed", &self.stream.is_none())
            .finish()
    }
}

impl TcpTransport {
    /// Opens the connection to the configured server.
    ///
    /// With [`TlsMode::Implicit`] the TLS handshake happens here, before the
    /// server greeting is read.
    pub async fn connect(config: &ServerCredentials) -> SmtpResult<Self> {
        let address = config.address();

        let tcp = timeout(config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| SmtpError::connection(format!("Connect to {} timed out", address)))?
            .map_err(|e| Self::map_io_error(e, &address))?;

        tcp.set_nodelay(true).ok();

        let (stream, tls_enabled) = match config.tls {
            TlsMode::None => (TransportStream::Plain(BufReader::new(tcp)), false),
            TlsMode::Implicit => (Self::wrap_tls(tcp, config).await?, true),
        };

        tracing::debug!(address = %address, tls = tls_enabled, "SMTP connection established");

        Ok(Self {
            stream: Some(stream),
            command_timeout: config.command_timeout,
            address,
            tls_enabled,
        })
    }

    /// Returns true if the connection is TLS-protected.
    pub fn is_tls(&self) -> bool {
        self.tls_enabled
    }

    #[cfg(feature = "rustls-tls")]
    async fn wrap_tls(tcp: TcpStream, config: &ServerCredentials) -> SmtpResult<TransportStream> {
        use rustls::pki_types::ServerName;
        use std::sync::Arc;

        let mut root_store = rustls::RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let connector = tokio_rustls::TlsConnector::from(Arc::new(tls_config));
        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|_| SmtpError::configuration(format!("Invalid server name: {}", config.host)))?;

        let tls_stream = timeout(config.connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| SmtpError::connection("TLS handshake timed out"))?
            .map_err(|e| SmtpError::connection("TLS handshake failed").with_cause(e))?;

        Ok(TransportStream::Tls(BufReader::new(tls_stream)))
    }

    #[cfg(not(feature = "rustls-tls"))]
    async fn wrap_tls(_tcp: TcpStream, _config: &ServerCredentials) -> SmtpResult<TransportStream> {
        Err(SmtpError::configuration("No TLS implementation available"))
    }

    /// Maps IO errors to SMTP errors.
    fn map_io_error(error: io::Error, address: &str) -> SmtpError {
        let message = match error.kind() {
            io::ErrorKind::ConnectionRefused => format!("Connection refused to {}", address),
            io::ErrorKind::ConnectionReset => "Connection reset by server".to_string(),
            io::ErrorKind::TimedOut => "Connect timed out".to_string(),
            _ => format!("Connection error to {}", address),
        };
        SmtpError::connection(message).with_cause(error)
    }

    fn stream(&mut self) -> SmtpResult<&mut TransportStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| SmtpError::connection("Connection already closed"))
    }

    /// Reads lines until the final line of a reply.
    async fn read_response_inner<R: AsyncBufRead + Unpin>(
        reader: &mut R,
        timeout_duration: Duration,
    ) -> SmtpResult<SmtpResponse> {
        let mut lines = Vec::new();

        loop {
            let mut buf = Vec::new();
            let mut limited = (&mut *reader).take(MAX_REPLY_LINE_LEN as u64 + 1);

            let read = timeout(timeout_duration, limited.read_until(b'\n', &mut buf))
                .await
                .map_err(|_| SmtpError::connection("Read timed out"))?
                .map_err(|e| SmtpError::connection("Read error").with_cause(e))?;

            if read == 0 {
                return Err(SmtpError::connection("Server closed connection"));
            }
            if buf.len() > MAX_REPLY_LINE_LEN {
                return Err(SmtpError::connection("Server reply line exceeded length limit"));
            }

            let line = String::from_utf8_lossy(&buf).trim_end().to_string();
            let is_continuation = SmtpResponse::is_continuation(&line);
            lines.push(line);

            if !is_continuation {
                break;
            }
            if lines.len() >= MAX_REPLY_LINES {
                return Err(SmtpError::connection("Server reply exceeded line limit"));
            }
        }

        Ok(SmtpResponse::from_lines(lines))
    }

    /// Writes data to the stream.
    async fn write_all<W: AsyncWrite + Unpin>(
        writer: &mut W,
        data: &[u8],
        timeout_duration: Duration,
    ) -> SmtpResult<()> {
        timeout(timeout_duration, writer.write_all(data))
            .await
            .map_err(|_| SmtpError::connection("Write timed out"))?
            .map_err(|e| SmtpError::connection("Write error").with_cause(e))?;

        timeout(timeout_duration, writer.flush())
            .await
            .map_err(|_| SmtpError::connection("Flush timed out"))?
            .map_err(|e| SmtpError::connection("Flush error").with_cause(e))?;

        Ok(())
    }
}

#[async_trait]
impl SmtpTransport for TcpTransport {
    async fn send_line(&mut self, line: &str) -> SmtpResult<()> {
        let command_timeout = self.command_timeout;
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");

        tracing::trace!(bytes = data.len(), "Writing SMTP line");

        match self.stream()? {
            TransportStream::Plain(stream) => {
                Self::write_all(stream.get_mut(), &data, command_timeout).await
            }
            #[cfg(feature = "rustls-tls")]
            TransportStream::Tls(stream) => {
                Self::write_all(stream.get_mut(), &data, command_timeout).await
            }
        }
    }

    async fn read_response(&mut self) -> SmtpResult<SmtpResponse> {
        let command_timeout = self.command_timeout;
        let response = match self.stream()? {
            TransportStream::Plain(stream) => {
                Self::read_response_inner(stream, command_timeout).await?
            }
            #[cfg(feature = "rustls-tls")]
            TransportStream::Tls(stream) => {
                Self::read_response_inner(stream, command_timeout).await?
            }
        };

        tracing::trace!(code = response.code, lines = response.lines.len(), "Read SMTP reply");

        Ok(response)
    }

    async fn close(&mut self) -> SmtpResult<()> {
        if let Some(stream) = self.stream.take() {
            // Best effort: the socket is released when `stream` drops either way.
            let _ = match stream {
                TransportStream::Plain(mut s) => {
                    timeout(self.command_timeout, s.get_mut().shutdown()).await
                }
                #[cfg(feature = "rustls-tls")]
                TransportStream::Tls(mut s) => {
                    timeout(self.command_timeout, s.get_mut().shutdown()).await
                }
            };
            tracing::debug!(address = %self.address, "SMTP connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}
