//! SMTP wire types.
//!
//! Commands the submission dialogue sends and the replies it reads back.

use std::fmt;
use secrecy::{ExposeSecret, SecretString};

/// SMTP commands.
#[derive(Debug, Clone)]
pub enum SmtpCommand {
    /// Extended HELLO with client identity.
    Ehlo(String),
    /// Start the LOGIN authentication exchange.
    AuthLogin,
    /// Base64-encoded credential line answering a `334` challenge.
    AuthResponse(SecretString),
    /// MAIL FROM with the bare sender address.
    MailFrom(String),
    /// RCPT TO with the bare recipient address.
    RcptTo(String),
    /// DATA command.
    Data,
    /// Dot-stuffed message content, terminated by a lone `.` line.
    Message(String),
    /// Quit connection.
    Quit,
}

impl SmtpCommand {
    /// Formats the command for sending, without the trailing CRLF.
    pub fn to_smtp_string(&self) -> String {
        match self {
            SmtpCommand::Ehlo(domain) => format!("EHLO {}", domain),
            SmtpCommand::AuthLogin => "AUTH LOGIN".to_string(),
            SmtpCommand::AuthResponse(encoded) => encoded.expose_secret().clone(),
            SmtpCommand::MailFrom(address) => format!("MAIL FROM:<{}>", address),
            SmtpCommand::RcptTo(address) => format!("RCPT TO:<{}>", address),
            SmtpCommand::Data => "DATA".to_string(),
            SmtpCommand::Message(payload) => payload.clone(),
            SmtpCommand::Quit => "QUIT".to_string(),
        }
    }
}

/// Log-safe rendering: credential lines are hidden and message content is
/// reduced to its size.
impl fmt::Display for SmtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtpCommand::AuthResponse(_) => write!(f, "<credentials>"),
            SmtpCommand::Message(payload) => write!(f, "<message, {} bytes>", payload.len()),
            other => write!(f, "{}", other.to_smtp_string()),
        }
    }
}

/// SMTP reply from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpResponse {
    /// Status code of the final line, `0` when the reply has no numeric prefix.
    pub code: u16,
    /// Reply lines without their line terminators.
    pub lines: Vec<String>,
}

impl SmtpResponse {
    /// Creates a single-line reply.
    pub fn new(code: u16, message: impl AsRef<str>) -> Self {
        Self {
            code,
            lines: vec![format!("{} {}", code, message.as_ref())],
        }
    }

    /// Builds a reply from raw lines as read off the wire.
    ///
    /// The code is taken from the last line, which is the one that
    /// terminates a multi-line reply.
    pub fn from_lines(lines: Vec<String>) -> Self {
        let code = lines.last().map(|line| Self::parse_code(line)).unwrap_or(0);
        Self { code, lines }
    }

    /// Reads the three-digit prefix of a reply line.
    fn parse_code(line: &str) -> u16 {
        match line.get(..3) {
            Some(prefix) if prefix.bytes().all(|b| b.is_ascii_digit()) => {
                prefix.parse().unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Returns true if a reply line continues onto the next one (`250-...`).
    pub fn is_continuation(line: &str) -> bool {
        line.as_bytes().get(3) == Some(&b'-')
    }

    /// Returns the final line, which carries the outcome.
    pub fn last_line(&self) -> &str {
        self.lines.last().map(|s| s.as_str()).unwrap_or("")
    }

    /// Returns the raw reply text, lines joined with CRLF.
    pub fn raw(&self) -> String {
        self.lines.join("\r\n")
    }
}

impl fmt::Display for SmtpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.last_line())
    }
}

/// Response codes used by the submission dialogue.
pub mod codes {
    /// Service ready.
    pub const SERVICE_READY: u16 = 220;
    /// Authentication successful.
    pub const AUTH_SUCCESS: u16 = 235;
    /// OK.
    pub const OK: u16 = 250;
    /// User not local; will forward.
    pub const USER_NOT_LOCAL_WILL_FORWARD: u16 = 251;
    /// Continue (AUTH).
    pub const AUTH_CONTINUE: u16 = 334;
    /// Start mail input.
    pub const START_MAIL_INPUT: u16 = 354;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_formatting() {
        assert_eq!(
            SmtpCommand::Ehlo("localhost".to_string()).to_smtp_string(),
            "EHLO localhost"
        );
        assert_eq!(SmtpCommand::AuthLogin.to_smtp_string(), "AUTH LOGIN");
        assert_eq!(
            SmtpCommand::MailFrom("info@example.com".to_string()).to_smtp_string(),
            "MAIL FROM:<info@example.com>"
        );
        assert_eq!(
            SmtpCommand::RcptTo("user@example.com".to_string()).to_smtp_string(),
            "RCPT TO:<user@example.com>"
        );
        assert_eq!(SmtpCommand::Data.to_smtp_string(), "DATA");
        assert_eq!(SmtpCommand::Quit.to_smtp_string(), "QUIT");
    }

    #[test]
    fn test_display_hides_credentials() {
        let command = SmtpCommand::AuthResponse(SecretString::new("aHVudGVyMg==".to_string()));
        assert_eq!(command.to_smtp_string(), "aHVudGVyMg==");
        assert_eq!(command.to_string(), "<credentials>");
        assert!(!format!("{:?}", command).contains("aHVudGVyMg=="));
    }

    #[test]
    fn test_display_summarises_message() {
        let command = SmtpCommand::Message("Subject: hi\r\n\r\nbody\r\n.".to_string());
        assert_eq!(command.to_string(), "<message, 22 bytes>");
    }

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_response_from_lines() {
        let response = SmtpResponse::from_lines(lines(&["250 OK"]));
        assert_eq!(response.code, 250);
        assert_eq!(response.to_string(), "250 OK");

        let response = SmtpResponse::from_lines(lines(&[
            "250-smtp.example.com Hello",
            "250-SIZE 10485760",
            "250 AUTH LOGIN PLAIN",
        ]));
        assert_eq!(response.code, 250);
        assert_eq!(response.lines.len(), 3);
        assert_eq!(response.last_line(), "250 AUTH LOGIN PLAIN");
    }

    #[test]
    fn test_response_without_code() {
        let response = SmtpResponse::from_lines(lines(&["hello there"]));
        assert_eq!(response.code, 0);
        assert_eq!(response.lines, ["hello there"]);

        let response = SmtpResponse::from_lines(Vec::new());
        assert_eq!(response.code, 0);
        assert_eq!(response.last_line(), "");
    }

    #[test]
    fn test_continuation() {
        assert!(SmtpResponse::is_continuation("250-PIPELINING"));
        assert!(!SmtpResponse::is_continuation("250 OK"));
        assert!(!SmtpResponse::is_continuation("250"));
    }

    #[test]
    fn test_raw_round_trips_lines() {
        let response = SmtpResponse::new(535, "5.7.8 Authentication credentials invalid");
        assert_eq!(response.raw(), "535 5.7.8 Authentication credentials invalid");
    }
}
