//! Mock implementations for testing.
//!
//! [`MockTransport`] plays back a scripted list of server replies and records
//! every line written to it. Clones share their state, so a test can keep a
//! handle while the dialogue owns or borrows the transport.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::{SmtpError, SmtpResult};
use crate::protocol::{codes, SmtpResponse};
use crate::transport::SmtpTransport;

/// Mock SMTP transport for testing.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    /// Lines written, without CRLF.
    sent: Arc<Mutex<Vec<String>>>,
    /// Queued replies.
    responses: Arc<Mutex<VecDeque<SmtpResponse>>>,
    /// Number of `read_response` calls.
    reads: Arc<AtomicUsize>,
    /// Zero-based index of the write that fails.
    fail_send_at: Arc<Mutex<Option<usize>>>,
    /// Next read fails.
    fail_next_read: Arc<AtomicBool>,
    /// Set by `close`.
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    /// Creates a mock with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock that plays back `responses` in order.
    pub fn with_responses(responses: impl IntoIterator<Item = SmtpResponse>) -> Self {
        let transport = Self::new();
        for response in responses {
            transport.queue_response(response);
        }
        transport
    }

    /// Creates a mock scripted for a complete successful submission.
    pub fn happy_path() -> Self {
        Self::with_responses(happy_path_responses())
    }

    /// Queues a response.
    pub fn queue_response(&self, response: SmtpResponse) -> &Self {
        lock(&self.responses).push_back(response);
        self
    }

    /// Queues a single-line response with the given code.
    pub fn queue_code(&self, code: u16, message: &str) -> &Self {
        self.queue_response(SmtpResponse::new(code, message))
    }

    /// Makes the `index`-th write (zero-based) fail with a connection error.
    pub fn fail_on_send(&self, index: usize) -> &Self {
        *lock(&self.fail_send_at) = Some(index);
        self
    }

    /// Makes the next read fail with a connection error.
    pub fn fail_next_read(&self) -> &Self {
        self.fail_next_read.store(true, Ordering::SeqCst);
        self
    }

    /// Returns the lines written so far.
    pub fn sent_lines(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    /// Returns the number of reads attempted.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Returns the number of scripted replies not yet consumed.
    pub fn pending_responses(&self) -> usize {
        lock(&self.responses).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl SmtpTransport for MockTransport {
    async fn send_line(&mut self, line: &str) -> SmtpResult<()> {
        if self.is_closed() {
            return Err(SmtpError::connection("Connection already closed"));
        }

        let mut sent = lock(&self.sent);
        if *lock(&self.fail_send_at) == Some(sent.len()) {
            return Err(SmtpError::connection("Connection reset by server"));
        }
        sent.push(line.to_string());
        Ok(())
    }

    async fn read_response(&mut self) -> SmtpResult<SmtpResponse> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.is_closed() {
            return Err(SmtpError::connection("Connection already closed"));
        }
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(SmtpError::connection("Read error"));
        }

        lock(&self.responses)
            .pop_front()
            .ok_or_else(|| SmtpError::connection("Server closed connection"))
    }

    async fn close(&mut self) -> SmtpResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Replies for a full successful submission, in order: greeting, EHLO,
/// both AUTH challenges, AUTH success, MAIL FROM, RCPT TO, DATA, end of data.
pub fn happy_path_responses() -> Vec<SmtpResponse> {
    vec![
        greeting_response(),
        ehlo_response(),
        auth_continue_response("VXNlcm5hbWU6"),
        auth_continue_response("UGFzc3dvcmQ6"),
        auth_success_response(),
        SmtpResponse::new(codes::OK, "2.1.0 Sender OK"),
        SmtpResponse::new(codes::OK, "2.1.5 Recipient OK"),
        data_ready_response(),
        SmtpResponse::new(codes::OK, "2.0.0 Ok: queued as 4F2A1"),
    ]
}

/// Creates a greeting response.
pub fn greeting_response() -> SmtpResponse {
    SmtpResponse::new(codes::SERVICE_READY, "smtp.example.com ESMTP ready")
}

/// Creates a multi-line EHLO response.
pub fn ehlo_response() -> SmtpResponse {
    SmtpResponse::from_lines(vec![
        "250-smtp.example.com Hello".to_string(),
        "250-SIZE 10485760".to_string(),
        "250-8BITMIME".to_string(),
        "250 AUTH PLAIN LOGIN".to_string(),
    ])
}

/// Creates an AUTH continue response.
pub fn auth_continue_response(challenge: &str) -> SmtpResponse {
    SmtpResponse::new(codes::AUTH_CONTINUE, challenge)
}

/// Creates an authentication success response.
pub fn auth_success_response() -> SmtpResponse {
    SmtpResponse::new(codes::AUTH_SUCCESS, "2.7.0 Authentication successful")
}

/// Creates a DATA ready response.
pub fn data_ready_response() -> SmtpResponse {
    SmtpResponse::new(codes::START_MAIL_INPUT, "End data with <CR><LF>.<CR><LF>")
}
