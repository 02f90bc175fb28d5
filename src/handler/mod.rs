//! JSON request handling for the send-email endpoint.
//!
//! Decodes `{ "to", "subject", "html", "text"? }`, sends the message and
//! renders the `{ "success", "message" | "error" }` envelope with an HTTP
//! status. Routing, CORS and the listener belong to the hosting server.

use serde::{Deserialize, Serialize};

use crate::client::SmtpClient;
use crate::errors::{SmtpError, SmtpErrorKind, SmtpResult};
use crate::types::SendRequest;

/// Message returned on success.
pub const SUCCESS_MESSAGE: &str = "Email sent successfully";

/// Prefix of every error returned to the caller.
pub const FAILURE_PREFIX: &str = "Failed to send email";

/// Inbound request body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EmailRequest {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
    /// Plain-text body.
    #[serde(default)]
    pub text: Option<String>,
}

impl TryFrom<EmailRequest> for SendRequest {
    type Error = SmtpError;

    fn try_from(request: EmailRequest) -> SmtpResult<Self> {
        SendRequest::new(request.to, request.subject, request.html, request.text)
    }
}

/// Response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailResponse {
    /// Whether the message was accepted by the server.
    pub success: bool,
    /// Set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailResponse {
    fn sent() -> Self {
        Self {
            success: true,
            message: Some(SUCCESS_MESSAGE.to_string()),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
        }
    }
}

/// Status code and body for one handled request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReply {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: EmailResponse,
}

impl HandlerReply {
    /// Serializes the body.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_else(|_| {
            format!("{{\"success\":{}}}", self.body.success)
        })
    }
}

/// Handles send-email requests with one configured client.
#[derive(Debug)]
pub struct EmailHandler {
    client: SmtpClient,
    expose_server_text: bool,
}

impl EmailHandler {
    /// Creates a handler around a client.
    pub fn new(client: SmtpClient) -> Self {
        Self {
            client,
            expose_server_text: false,
        }
    }

    /// Creates a handler configured from the `SMTP_*` environment variables.
    ///
    /// Fails with a configuration error, before any network activity, when
    /// the credentials are missing.
    pub fn from_env() -> SmtpResult<Self> {
        SmtpClient::from_env().map(Self::new)
    }

    /// Includes the server's reply text in error responses. Off by default.
    pub fn expose_server_text(mut self, expose: bool) -> Self {
        self.expose_server_text = expose;
        self
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &SmtpClient {
        &self.client
    }

    /// Handles one raw JSON request body.
    pub async fn handle(&self, body: &[u8]) -> HandlerReply {
        let request = match Self::parse(body) {
            Ok(request) => request,
            Err(e) => return self.error_reply(&e),
        };

        match self.client.send(request).await {
            Ok(_) => HandlerReply {
                status: 200,
                body: EmailResponse::sent(),
            },
            Err(e) => self.error_reply(&e),
        }
    }

    fn parse(body: &[u8]) -> SmtpResult<SendRequest> {
        let request: EmailRequest = serde_json::from_slice(body).map_err(|e| {
            SmtpError::invalid_request(format!("Malformed request body: {}", e)).with_cause(e)
        })?;
        SendRequest::try_from(request)
    }

    fn error_reply(&self, error: &SmtpError) -> HandlerReply {
        let status = if error.kind() == SmtpErrorKind::InvalidRequest {
            400
        } else {
            500
        };

        let detail = if self.expose_server_text || error.kind().is_caller_error() {
            error.to_string()
        } else {
            error.kind().to_string()
        };

        if error.kind().is_server_rejection() {
            tracing::warn!(
                status,
                kind = ?error.kind(),
                code = ?error.smtp_code(),
                "Mail server refused the message"
            );
        } else {
            tracing::error!(status, kind = ?error.kind(), "Email request failed");
        }

        HandlerReply {
            status,
            body: EmailResponse::failed(format!("{}: {}", FAILURE_PREFIX, detail)),
        }
    }
}
