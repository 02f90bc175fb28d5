//! Core types for the submission client.
//!
//! This module provides:
//! - The per-invocation send request
//! - Send result types

use std::time::Duration;

use crate::errors::{SmtpError, SmtpResult};

/// One message to deliver to a single recipient.
///
/// Immutable once built. The recipient and subject end up verbatim on the
/// `RCPT TO` line and in a header line, so they are rejected if they contain
/// a line break. The bodies are not inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    recipient: String,
    subject: String,
    html_body: String,
    text_body: String,
}

impl SendRequest {
    /// Creates a request with an HTML body and an optional plain-text body.
    ///
    /// The recipient is trimmed. Fails with [`SmtpErrorKind::InvalidRequest`]
    /// when it is empty or when the recipient or subject contains `\r` or
    /// `\n`.
    ///
    /// # Compatibility
    ///
    /// The previous send-email endpoint passed subjects through unchanged, so a
    /// subject with an embedded line break was still sent (with the extra text
    /// landing in the header block). Such requests are now refused before any
    /// connection is made. Callers that relied on this must strip line breaks
    /// from the subject first.
    ///
    /// [`SmtpErrorKind::InvalidRequest`]: crate::errors::SmtpErrorKind::InvalidRequest
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
        text_body: Option<String>,
    ) -> SmtpResult<Self> {
        let recipient = recipient.into().trim().to_string();
        let subject = subject.into();

        if recipient.is_empty() {
            return Err(SmtpError::invalid_request("Recipient address is required"));
        }
        if contains_line_break(&recipient) {
            return Err(SmtpError::invalid_request(
                "Recipient address must not contain line breaks",
            ));
        }
        if contains_line_break(&subject) {
            return Err(SmtpError::invalid_request("Subject must not contain line breaks"));
        }

        Ok(Self {
            recipient,
            subject,
            html_body: html_body.into(),
            text_body: text_body.unwrap_or_default(),
        })
    }

    /// Recipient address.
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Subject line.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// HTML rendering of the message.
    pub fn html_body(&self) -> &str {
        &self.html_body
    }

    /// Plain-text rendering of the message. Empty when none was given.
    pub fn text_body(&self) -> &str {
        &self.text_body
    }
}

fn contains_line_break(value: &str) -> bool {
    value.contains(['\r', '\n'])
}

/// Outcome of a successful send.
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Recipient the message was accepted for.
    pub recipient: String,
    /// Server reply to the end of the message data.
    pub response: String,
    /// Time taken for the whole send.
    pub duration: Duration,
}

/// Outcome of several independent sends.
#[derive(Debug)]
pub struct BatchSendResult {
    /// Per-request results, in request order.
    pub results: Vec<SmtpResult<SendResult>>,
    /// Total requests.
    pub total: usize,
    /// Successful sends.
    pub succeeded: usize,
    /// Failed sends.
    pub failed: usize,
    /// Wall-clock time for the whole batch.
    pub duration: Duration,
}

impl BatchSendResult {
    /// Returns true if every send succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SmtpErrorKind;

    #[test]
    fn test_text_body_defaults_to_empty() {
        let request = SendRequest::new("user@example.com", "Thank you", "<p>Hi</p>", None).unwrap();
        assert_eq!(request.recipient(), "user@example.com");
        assert_eq!(request.text_body(), "");
        assert_eq!(request.html_body(), "<p>Hi</p>");
    }

    #[test]
    fn test_recipient_is_trimmed() {
        let request = SendRequest::new("  user@example.com ", "Hi", "", None).unwrap();
        assert_eq!(request.recipient(), "user@example.com");
    }

    #[test]
    fn test_rejects_empty_recipient() {
        let err = SendRequest::new("   ", "Hi", "<p>Hi</p>", None).unwrap_err();
        assert_eq!(err.kind(), SmtpErrorKind::InvalidRequest);
    }

    #[test]
    fn test_rejects_header_injection() {
        let err = SendRequest::new(
            "user@example.com",
            "Hello\r\nBcc: victim@example.com",
            "<p>Hi</p>",
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), SmtpErrorKind::InvalidRequest);

        let err = SendRequest::new(
            "user@example.com>\r\nRCPT TO:<other@example.com",
            "Hello",
            "<p>Hi</p>",
            None,
        )
        .unwrap_err();
        assert_eq!(err.kind(), SmtpErrorKind::InvalidRequest);
    }

    #[test]
    fn test_bodies_may_span_lines() {
        let request = SendRequest::new(
            "user@example.com",
            "Hi",
            "<p>one</p>\r\n<p>two</p>",
            Some("one\ntwo".to_string()),
        )
        .unwrap();
        assert_eq!(request.text_body(), "one\ntwo");
    }
}
