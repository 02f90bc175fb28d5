//! AUTH LOGIN credential encoding.
//!
//! LOGIN sends the username and the password as two separate base64 lines,
//! each in answer to a `334` challenge. The encoded lines are as sensitive as
//! the password itself, so they stay wrapped in [`SecretString`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use secrecy::{ExposeSecret, SecretString};

use crate::config::ServerCredentials;
use crate::protocol::SmtpCommand;

/// Encoded LOGIN exchange for one set of credentials.
pub struct LoginAuthenticator {
    username: SecretString,
    password: SecretString,
}

impl LoginAuthenticator {
    /// Encodes the username and password from the server settings.
    pub fn new(credentials: &ServerCredentials) -> Self {
        Self {
            username: Self::encode(&credentials.username),
            password: Self::encode(credentials.password.expose_secret()),
        }
    }

    fn encode(value: &str) -> SecretString {
        SecretString::new(BASE64.encode(value))
    }

    /// Line answering the username challenge.
    pub fn username_response(&self) -> SmtpCommand {
        SmtpCommand::AuthResponse(self.username.clone())
    }

    /// Line answering the password challenge.
    pub fn password_response(&self) -> SmtpCommand {
        SmtpCommand::AuthResponse(self.password.clone())
    }
}
