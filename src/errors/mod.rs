//! Error types for the submission client.
//!
//! Every failure is an [`SmtpError`] carrying the dialogue step it happened in
//! ([`SmtpErrorKind`]), the server reply that caused it (truncated), and the
//! numeric reply code when there was one. Credentials are never part of an
//! error: only text received from the server is captured.

use std::fmt;
use thiserror::Error;

/// Result type for SMTP operations.
pub type SmtpResult<T> = Result<T, SmtpError>;

/// Longest server reply text kept in an error, in bytes.
pub const MAX_DIAGNOSTIC_LEN: usize = 512;

/// Categorises where a send attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SmtpErrorKind {
    /// Socket, TLS or timeout failure on the transport.
    Connection,
    /// Server greeting was not `220`.
    Greeting,
    /// `EHLO` was not answered with `250`.
    Handshake,
    /// Any step of `AUTH LOGIN` was refused.
    Auth,
    /// `MAIL FROM` was refused.
    SenderRejected,
    /// `RCPT TO` was refused.
    RecipientRejected,
    /// `DATA` was not answered with `354`.
    DataPhaseRejected,
    /// The message body was not accepted.
    TransmissionRejected,
    /// Settings are missing or invalid. Raised before any network activity.
    Configuration,
    /// The request to send is malformed.
    InvalidRequest,
    /// A dialogue was driven past its terminal state.
    CommandSequence,
    /// The whole send exceeded its deadline.
    Timeout,
}

impl SmtpErrorKind {
    /// Returns true if the server answered and refused, as opposed to the
    /// exchange breaking down locally.
    pub fn is_server_rejection(&self) -> bool {
        matches!(
            self,
            SmtpErrorKind::Greeting
                | SmtpErrorKind::Handshake
                | SmtpErrorKind::Auth
                | SmtpErrorKind::SenderRejected
                | SmtpErrorKind::RecipientRejected
                | SmtpErrorKind::DataPhaseRejected
                | SmtpErrorKind::TransmissionRejected
        )
    }

    /// Returns true if the error was caused by the caller's input or setup
    /// rather than by the mail server or the network.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            SmtpErrorKind::Configuration | SmtpErrorKind::InvalidRequest
        )
    }
}

impl fmt::Display for SmtpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpErrorKind::Connection => write!(f, "Connection error"),
            SmtpErrorKind::Greeting => write!(f, "Unexpected server greeting"),
            SmtpErrorKind::Handshake => write!(f, "EHLO handshake failed"),
            SmtpErrorKind::Auth => write!(f, "Authentication failed"),
            SmtpErrorKind::SenderRejected => write!(f, "Sender rejected"),
            SmtpErrorKind::RecipientRejected => write!(f, "Recipient rejected"),
            SmtpErrorKind::DataPhaseRejected => write!(f, "DATA command rejected"),
            SmtpErrorKind::TransmissionRejected => write!(f, "Message rejected"),
            SmtpErrorKind::Configuration => write!(f, "Invalid configuration"),
            SmtpErrorKind::InvalidRequest => write!(f, "Invalid request"),
            SmtpErrorKind::CommandSequence => write!(f, "Command sequence error"),
            SmtpErrorKind::Timeout => write!(f, "Send timed out"),
        }
    }
}

/// SMTP error with detailed information.
#[derive(Error, Debug)]
pub struct SmtpError {
    kind: SmtpErrorKind,
    message: String,
    smtp_code: Option<u16>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SmtpError {
    /// Creates a new SMTP error.
    pub fn new(kind: SmtpErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: truncate(message.into()),
            smtp_code: None,
            cause: None,
        }
    }

    /// Sets the SMTP status code.
    pub fn with_smtp_code(mut self, code: u16) -> Self {
        self.smtp_code = Some(code);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause<E: std::error::Error + Send + Sync + 'static>(mut self, cause: E) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Returns the error kind.
    pub fn kind(&self) -> SmtpErrorKind {
        self.kind
    }

    /// Returns the diagnostic message (server reply text for rejections).
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the SMTP status code if available.
    pub fn smtp_code(&self) -> Option<u16> {
        self.smtp_code
    }

    // Convenience constructors

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Connection, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::Configuration, message)
    }

    /// Creates a request validation error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SmtpErrorKind::InvalidRequest, message)
    }

    /// Creates an error for a server reply that did not match what the
    /// current dialogue step expects.
    pub fn rejected(kind: SmtpErrorKind, code: u16, reply: impl Into<String>) -> Self {
        Self::new(kind, reply).with_smtp_code(code)
    }
}

impl fmt::Display for SmtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(code) = self.smtp_code {
            write!(f, " (SMTP {})", code)?;
        }
        Ok(())
    }
}

/// Cuts diagnostic text down to [`MAX_DIAGNOSTIC_LEN`] bytes without
/// splitting a UTF-8 sequence.
fn truncate(mut text: String) -> String {
    if text.len() <= MAX_DIAGNOSTIC_LEN {
        return text;
    }
    let mut end = MAX_DIAGNOSTIC_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    text.push_str("...");
    text
}
