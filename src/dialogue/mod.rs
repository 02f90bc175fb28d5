//! SMTP submission dialogue.
//!
//! The dialogue walks one transport through a fixed command sequence:
//!
//! ```text
//! greeting -> EHLO -> AUTH LOGIN -> username -> password -> MAIL FROM
//!          -> RCPT TO -> DATA -> message -> QUIT
//! ```
//!
//! Each step sends one command, reads exactly one reply and either advances
//! or fails with the [`SmtpErrorKind`] of that step. A dialogue is single-use;
//! the session is closed on every exit path.

use crate::auth::LoginAuthenticator;
use crate::config::ServerCredentials;
use crate::errors::{SmtpError, SmtpErrorKind, SmtpResult};
use crate::mime::MimeMessage;
use crate::observability::SmtpMetrics;
use crate::protocol::{codes, SmtpCommand, SmtpResponse};
use crate::transport::SmtpTransport;

/// Position in the submission dialogue.
///
/// The state names the step whose command is sent next (or, for
/// [`DialogueState::Connected`], the greeting that is read next).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogueState {
    /// Socket open, greeting not yet read.
    Connected,
    /// Greeting accepted; EHLO pending.
    Greeted,
    /// EHLO accepted; AUTH LOGIN pending.
    AuthRequested,
    /// Username challenge received; username pending.
    UsernameSent,
    /// Password challenge received; password pending.
    PasswordSent,
    /// Authenticated; MAIL FROM pending.
    Authenticated,
    /// Sender accepted; RCPT TO pending.
    SenderAccepted,
    /// Recipient accepted; DATA pending.
    RecipientAccepted,
    /// Server awaits message content.
    DataPhase,
    /// Message accepted.
    Sent,
    /// Aborted.
    Failed,
}

impl DialogueState {
    /// Applies a reply code to the current state.
    ///
    /// Returns the next state, or the error kind of the step that was
    /// refused. Terminal states accept nothing.
    pub fn transition(self, code: u16) -> Result<DialogueState, SmtpErrorKind> {
        let (accepted, next, kind): (&[u16], DialogueState, SmtpErrorKind) = match self {
            DialogueState::Connected => (
                &[codes::SERVICE_READY],
                DialogueState::Greeted,
                SmtpErrorKind::Greeting,
            ),
            DialogueState::Greeted => (
                &[codes::OK],
                DialogueState::AuthRequested,
                SmtpErrorKind::Handshake,
            ),
            DialogueState::AuthRequested => (
                &[codes::AUTH_CONTINUE],
                DialogueState::UsernameSent,
                SmtpErrorKind::Auth,
            ),
            DialogueState::UsernameSent => (
                &[codes::AUTH_CONTINUE],
                DialogueState::PasswordSent,
                SmtpErrorKind::Auth,
            ),
            DialogueState::PasswordSent => (
                &[codes::AUTH_SUCCESS],
                DialogueState::Authenticated,
                SmtpErrorKind::Auth,
            ),
            DialogueState::Authenticated => (
                &[codes::OK],
                DialogueState::SenderAccepted,
                SmtpErrorKind::SenderRejected,
            ),
            DialogueState::SenderAccepted => (
                &[codes::OK, codes::USER_NOT_LOCAL_WILL_FORWARD],
                DialogueState::RecipientAccepted,
                SmtpErrorKind::RecipientRejected,
            ),
            DialogueState::RecipientAccepted => (
                &[codes::START_MAIL_INPUT],
                DialogueState::DataPhase,
                SmtpErrorKind::DataPhaseRejected,
            ),
            DialogueState::DataPhase => (
                &[codes::OK],
                DialogueState::Sent,
                SmtpErrorKind::TransmissionRejected,
            ),
            DialogueState::Sent | DialogueState::Failed => {
                return Err(SmtpErrorKind::CommandSequence);
            }
        };

        if accepted.contains(&code) {
            Ok(next)
        } else {
            Err(kind)
        }
    }

    /// Returns true once the dialogue can make no further progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, DialogueState::Sent | DialogueState::Failed)
    }
}

/// One submission over one transport.
#[derive(Debug)]
pub struct SmtpDialogue<'a, T: SmtpTransport> {
    transport: &'a mut T,
    credentials: &'a ServerCredentials,
    state: DialogueState,
    metrics: Option<&'a SmtpMetrics>,
}

impl<'a, T: SmtpTransport> SmtpDialogue<'a, T> {
    /// Creates a dialogue over a freshly connected transport.
    pub fn new(transport: &'a mut T, credentials: &'a ServerCredentials) -> Self {
        Self {
            transport,
            credentials,
            state: DialogueState::Connected,
            metrics: None,
        }
    }

    /// Records authentication outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: &'a SmtpMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Current state.
    pub fn state(&self) -> DialogueState {
        self.state
    }

    /// Runs the dialogue to completion and closes the transport.
    ///
    /// Returns the server's reply to the end of the message data.
    pub async fn run(&mut self, recipient: &str, message: &MimeMessage) -> SmtpResult<SmtpResponse> {
        if self.state != DialogueState::Connected {
            return Err(SmtpError::new(
                SmtpErrorKind::CommandSequence,
                format!("Dialogue already finished ({:?})", self.state),
            ));
        }

        let result = self.drive(recipient, message).await;

        match &result {
            Ok(response) => {
                tracing::info!(code = response.code, "Message accepted");
                // The session ends here whatever the server says to QUIT.
                if let Err(e) = self.transport.send_line(&SmtpCommand::Quit.to_smtp_string()).await {
                    tracing::debug!(error = %e, "QUIT not delivered");
                }
            }
            Err(e) => {
                self.state = DialogueState::Failed;
                tracing::warn!(kind = ?e.kind(), code = ?e.smtp_code(), "SMTP dialogue failed");
            }
        }

        if let Err(e) = self.transport.close().await {
            tracing::debug!(error = %e, "Error closing SMTP session");
        }

        result
    }

    async fn drive(&mut self, recipient: &str, message: &MimeMessage) -> SmtpResult<SmtpResponse> {
        let auth = LoginAuthenticator::new(self.credentials);
        let mut payload = Some(message.to_data_payload());

        loop {
            let command = match self.state {
                DialogueState::Connected => None,
                DialogueState::Greeted => Some(SmtpCommand::Ehlo(self.credentials.client_id.clone())),
                DialogueState::AuthRequested => Some(SmtpCommand::AuthLogin),
                DialogueState::UsernameSent => Some(auth.username_response()),
                DialogueState::PasswordSent => Some(auth.password_response()),
                DialogueState::Authenticated => {
                    Some(SmtpCommand::MailFrom(self.credentials.from_address.clone()))
                }
                DialogueState::SenderAccepted => Some(SmtpCommand::RcptTo(recipient.to_string())),
                DialogueState::RecipientAccepted => Some(SmtpCommand::Data),
                DialogueState::DataPhase => Some(SmtpCommand::Message(payload.take().unwrap_or_default())),
                DialogueState::Sent | DialogueState::Failed => {
                    return Err(SmtpError::new(
                        SmtpErrorKind::CommandSequence,
                        format!("No command for state {:?}", self.state),
                    ));
                }
            };

            if let Some(command) = command {
                tracing::debug!(command = %command, "SMTP >>");
                self.transport.send_line(&command.to_smtp_string()).await?;
            }

            let response = self.transport.read_response().await?;
            tracing::debug!(code = response.code, reply = %response, "SMTP <<");

            let transition = self.state.transition(response.code);
            if self.state == DialogueState::PasswordSent {
                if let Some(metrics) = self.metrics {
                    metrics.record_auth_attempt(transition.is_ok());
                }
            }

            match transition {
                Ok(DialogueState::Sent) => {
                    self.state = DialogueState::Sent;
                    return Ok(response);
                }
                Ok(next) => self.state = next,
                Err(kind) => {
                    return Err(SmtpError::rejected(kind, response.code, response.raw()));
                }
            }
        }
    }
}
