//! MIME message composition.
//!
//! Every message is `multipart/alternative` with a plain-text part followed
//! by an HTML part, both UTF-8 and sent as-is. The plain-text part is always
//! present, even when empty.
//!
//! The composer does not sanitize anything. The boundary token is random
//! enough that a collision with body content is not a practical concern, but
//! nothing escapes it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::SendRequest;

/// Longest chunk of a header value put into a single RFC 2047 encoded word.
/// 45 input bytes become 60 base64 characters, which keeps each word under
/// the 75 character limit.
const ENCODED_WORD_CHUNK: usize = 45;

/// MIME content types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// Plain text.
    TextPlain,
    /// HTML content.
    TextHtml,
    /// Multipart alternative (text + HTML).
    MultipartAlternative(String),
}

impl ContentType {
    /// Returns the MIME type string.
    pub fn mime_type(&self) -> String {
        match self {
            ContentType::TextPlain => "text/plain; charset=utf-8".to_string(),
            ContentType::TextHtml => "text/html; charset=utf-8".to_string(),
            ContentType::MultipartAlternative(boundary) => {
                format!("multipart/alternative; boundary=\"{}\"", boundary)
            }
        }
    }
}

/// A composed message, ready for the DATA phase.
#[derive(Debug, Clone)]
pub struct MimeMessage {
    headers: Vec<(String, String)>,
    boundary: String,
    text: String,
    html: String,
}

impl MimeMessage {
    /// Header lines in the order they are written.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the value of the first header with the given name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The multipart boundary token.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Content of the plain-text part.
    pub fn text_part(&self) -> &str {
        &self.text
    }

    /// Content of the HTML part.
    pub fn html_part(&self) -> &str {
        &self.html
    }

    /// Renders the message as RFC 5322 text with CRLF line endings.
    pub fn render(&self) -> String {
        let delimiter = format!("--{}", self.boundary);
        let mut lines: Vec<String> = self
            .headers
            .iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect();

        lines.push(String::new());

        for (content_type, content) in [
            (ContentType::TextPlain, &self.text),
            (ContentType::TextHtml, &self.html),
        ] {
            lines.push(delimiter.clone());
            lines.push(format!("Content-Type: {}", content_type.mime_type()));
            lines.push(String::new());
            lines.push(content.clone());
            lines.push(String::new());
        }

        lines.push(format!("{}--", delimiter));
        lines.join("\r\n")
    }

    /// Renders the message for transmission after `DATA`.
    ///
    /// Line endings are normalised to CRLF, lines starting with `.` are
    /// dot-stuffed, and the terminating lone `.` line is appended. The final
    /// CRLF is left to the transport, which terminates every line it sends.
    pub fn to_data_payload(&self) -> String {
        let rendered = self.render().replace("\r\n", "\n");
        let mut payload = String::with_capacity(rendered.len() + 64);

        for line in rendered.split('\n') {
            if line.starts_with('.') {
                payload.push('.');
            }
            payload.push_str(line);
            payload.push_str("\r\n");
        }

        payload.push('.');
        payload
    }
}

/// Builds [`MimeMessage`]s for one sender.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    from: String,
    domain: String,
}

impl MessageComposer {
    /// Creates a composer for messages sent from `from_address`.
    pub fn new(from_address: impl Into<String>) -> Self {
        let from = from_address.into();
        let domain = from
            .rsplit_once('@')
            .map(|(_, domain)| domain.to_string())
            .filter(|domain| !domain.is_empty())
            .unwrap_or_else(|| "localhost".to_string());
        Self { from, domain }
    }

    /// Composes the message for a request, with a fresh boundary.
    pub fn compose(&self, request: &SendRequest) -> MimeMessage {
        let now = Utc::now();
        let boundary = Self::generate_boundary(&now);

        let headers = vec![
            ("From".to_string(), self.from.clone()),
            ("To".to_string(), request.recipient().to_string()),
            ("Subject".to_string(), Self::encode_header(request.subject())),
            ("Date".to_string(), now.to_rfc2822()),
            ("Message-ID".to_string(), format!("<{}>", self.generate_message_id(&now))),
            ("MIME-Version".to_string(), "1.0".to_string()),
            (
                "Content-Type".to_string(),
                ContentType::MultipartAlternative(boundary.clone()).mime_type(),
            ),
        ];

        MimeMessage {
            headers,
            boundary,
            text: request.text_body().to_string(),
            html: request.html_body().to_string(),
        }
    }

    /// Generates a boundary from the current time plus 64 random bits.
    fn generate_boundary(now: &DateTime<Utc>) -> String {
        format!("----=_Part_{}_{:016x}", now.timestamp_millis(), rand::random::<u64>())
    }

    /// Generates a unique message ID.
    fn generate_message_id(&self, now: &DateTime<Utc>) -> String {
        format!("{}.{}@{}", Uuid::new_v4().simple(), now.timestamp(), self.domain)
    }

    /// Encodes a header value using RFC 2047 when it is not plain ASCII.
    fn encode_header(value: &str) -> String {
        if value.chars().all(|c| c.is_ascii() && !c.is_control()) {
            return value.to_string();
        }

        let mut words = Vec::new();
        let mut chunk = String::new();
        for c in value.chars() {
            if chunk.len() + c.len_utf8() > ENCODED_WORD_CHUNK {
                words.push(format!("=?UTF-8?B?{}?=", BASE64.encode(&chunk)));
                chunk.clear();
            }
            chunk.push(c);
        }
        if !chunk.is_empty() {
            words.push(format!("=?UTF-8?B?{}?=", BASE64.encode(&chunk)));
        }

        words.join("\r\n ")
    }
}
