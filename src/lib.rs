//! # site-mailer
//!
//! Minimal SMTP submission client for a website's transactional mail:
//! - One implicit-TLS connection per message (port 465)
//! - Fixed dialogue: EHLO, AUTH LOGIN, MAIL FROM, RCPT TO, DATA, QUIT
//! - `multipart/alternative` messages with a plain-text and an HTML part
//! - JSON request handling for a send-email endpoint
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use site_mailer::{SendRequest, ServerCredentials, SmtpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerCredentials::builder()
//!         .host("smtp.example.com")
//!         .credentials("info@example.com", "password")
//!         .build()?;
//!
//!     let client = SmtpClient::new(config)?;
//!
//!     let request = SendRequest::new(
//!         "visitor@example.org",
//!         "Thank you",
//!         "<p>Thanks for getting in touch.</p>",
//!         Some("Thanks for getting in touch.".to_string()),
//!     )?;
//!
//!     let result = client.send(request).await?;
//!     println!("Accepted: {}", result.response);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Protocol layer
pub mod protocol;
pub mod dialogue;

// Transport layer
pub mod transport;

// Authentication
pub mod auth;

// MIME encoding
pub mod mime;

// Observability
pub mod observability;

// Client
pub mod client;
pub mod handler;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use client::SmtpClient;
pub use config::{ServerCredentials, ServerCredentialsBuilder, TlsMode};
pub use dialogue::{DialogueState, SmtpDialogue};
pub use errors::{SmtpError, SmtpErrorKind, SmtpResult};
pub use handler::{EmailHandler, EmailRequest, EmailResponse, HandlerReply};
pub use mime::{MessageComposer, MimeMessage};
pub use observability::{MetricsSnapshot, SmtpMetrics};
pub use protocol::{SmtpCommand, SmtpResponse};
pub use transport::{SmtpTransport, TcpTransport};
pub use types::{BatchSendResult, SendRequest, SendResult};
