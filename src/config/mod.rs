//! Configuration types for the submission client.
//!
//! [`ServerCredentials`] is built once at the edge of the program, either with
//! the builder or from the process environment, and then passed by reference
//! into the client. Nothing below this module reads the environment.

use std::fmt;
use std::time::Duration;
use secrecy::{ExposeSecret, SecretString};

use crate::errors::{SmtpError, SmtpResult};

/// Default SMTP host.
pub const DEFAULT_HOST: &str = "smtp.strato.de";

/// Default SMTP port (submission over implicit TLS).
pub const DEFAULT_PORT: u16 = 465;

/// Default EHLO client identity.
pub const DEFAULT_CLIENT_ID: &str = "localhost";

/// Default timeout for connections, including the TLS handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for a single command write or reply read.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default deadline for one complete send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(120);

/// Environment variable names.
pub mod env {
    /// Server hostname.
    pub const HOST: &str = "SMTP_HOST";
    /// Server port.
    pub const PORT: &str = "SMTP_PORT";
    /// Login username.
    pub const USER: &str = "SMTP_USER";
    /// Login password.
    pub const PASSWORD: &str = "SMTP_PASSWORD";
    /// Envelope and header sender. Falls back to the username.
    pub const FROM_EMAIL: &str = "SMTP_FROM_EMAIL";
}

/// TLS mode for SMTP connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Plain TCP. Only meant for local test servers.
    None,
    /// TLS from the first byte (port 465).
    #[default]
    Implicit,
}

/// Connection and login settings for the mail server.
#[derive(Clone)]
pub struct ServerCredentials {
    /// SMTP server hostname.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// AUTH LOGIN username.
    pub username: String,
    /// AUTH LOGIN password.
    pub password: SecretString,
    /// Address used for `MAIL FROM` and the `From` header.
    pub from_address: String,
    /// Transport security.
    pub tls: TlsMode,
    /// Client identity sent with EHLO.
    pub client_id: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Per-command timeout.
    pub command_timeout: Duration,
    /// Deadline for a whole send.
    pub send_timeout: Duration,
}

impl ServerCredentials {
    /// Creates a new configuration builder.
    pub fn builder() -> ServerCredentialsBuilder {
        ServerCredentialsBuilder::default()
    }

    /// Loads settings from the process environment.
    pub fn from_env() -> SmtpResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup.
    ///
    /// Empty values count as unset. `SMTP_USER` and `SMTP_PASSWORD` are
    /// required; the rest fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> SmtpResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let (username, password) = match (get(env::USER), get(env::PASSWORD)) {
            (Some(user), Some(password)) => (user, password),
            _ => return Err(SmtpError::configuration("SMTP credentials not configured")),
        };

        let port = match get(env::PORT) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                SmtpError::configuration(format!("Invalid {}: {:?}", env::PORT, raw)).with_cause(e)
            })?,
            None => DEFAULT_PORT,
        };

        let from_address = get(env::FROM_EMAIL).unwrap_or_else(|| username.clone());

        Self::builder()
            .host(get(env::HOST).unwrap_or_else(|| DEFAULT_HOST.to_string()))
            .port(port)
            .credentials(username, password)
            .from_address(from_address)
            .build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SmtpResult<()> {
        if self.host.is_empty() {
            return Err(SmtpError::configuration("Host is required"));
        }

        if self.port == 0 {
            return Err(SmtpError::configuration("Port must be non-zero"));
        }

        if self.username.is_empty() || self.password.expose_secret().is_empty() {
            return Err(SmtpError::configuration("SMTP credentials not configured"));
        }

        if self.from_address.is_empty() {
            return Err(SmtpError::configuration("Sender address is required"));
        }

        if has_line_break(&self.from_address) || has_line_break(&self.client_id) {
            return Err(SmtpError::configuration(
                "Sender address and client id must be single-line",
            ));
        }

        Ok(())
    }

    /// Returns the full server address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ServerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("tls", &self.tls)
            .field("client_id", &self.client_id)
            .finish()
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

/// Builder for [`ServerCredentials`].
#[derive(Debug, Default)]
pub struct ServerCredentialsBuilder {
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<SecretString>,
    from_address: Option<String>,
    tls: TlsMode,
    client_id: Option<String>,
    connect_timeout: Duration,
    command_timeout: Duration,
    send_timeout: Duration,
}

impl ServerCredentialsBuilder {
    /// Sets the SMTP server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the SMTP server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the login username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::new(password.into()));
        self
    }

    /// Sets the sender address. Defaults to the username.
    pub fn from_address(mut self, from: impl Into<String>) -> Self {
        self.from_address = Some(from.into());
        self
    }

    /// Disables TLS (local test servers only).
    pub fn no_tls(mut self) -> Self {
        self.tls = TlsMode::None;
        self
    }

    /// Sets the client identifier for EHLO.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Sets connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets command timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the deadline for one complete send.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SmtpResult<ServerCredentials> {
        let username = self.username.unwrap_or_default();
        let config = ServerCredentials {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: if self.port == 0 { DEFAULT_PORT } else { self.port },
            from_address: self.from_address.unwrap_or_else(|| username.clone()),
            username,
            password: self.password.unwrap_or_else(|| SecretString::new(String::new())),
            tls: self.tls,
            client_id: self.client_id.unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            connect_timeout: or_default(self.connect_timeout, DEFAULT_CONNECT_TIMEOUT),
            command_timeout: or_default(self.command_timeout, DEFAULT_COMMAND_TIMEOUT),
            send_timeout: or_default(self.send_timeout, DEFAULT_SEND_TIMEOUT),
        };

        config.validate()?;
        Ok(config)
    }
}

fn or_default(value: Duration, default: Duration) -> Duration {
    if value == Duration::ZERO {
        default
    } else {
        value
    }
}
