//! Main SMTP client implementation.
//!
//! [`SmtpClient`] turns a [`SendRequest`] into one complete submission:
//! compose the message, open a fresh connection, run the dialogue and close.
//! Nothing is shared between sends apart from the metric counters, so
//! [`SmtpClient::send_batch`] can run requests side by side without one
//! failure affecting another.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tokio::time::timeout;

use crate::config::ServerCredentials;
use crate::dialogue::SmtpDialogue;
use crate::errors::{SmtpError, SmtpErrorKind, SmtpResult};
use crate::mime::MessageComposer;
use crate::observability::{SmtpMetrics, Timer};
use crate::protocol::SmtpResponse;
use crate::transport::{SmtpTransport, TcpTransport};
use crate::types::{BatchSendResult, SendRequest, SendResult};

/// High-level SMTP client.
#[derive(Debug)]
pub struct SmtpClient {
    /// Configuration.
    config: Arc<ServerCredentials>,
    /// Builds the message for each request.
    composer: MessageComposer,
    /// Metrics collector.
    metrics: Arc<SmtpMetrics>,
}

impl SmtpClient {
    /// Creates a new SMTP client. No connection is made until a send.
    pub fn new(config: ServerCredentials) -> SmtpResult<Self> {
        config.validate()?;
        let composer = MessageComposer::new(config.from_address.clone());

        Ok(Self {
            config: Arc::new(config),
            composer,
            metrics: Arc::new(SmtpMetrics::new()),
        })
    }

    /// Creates a client configured from the `SMTP_*` environment variables.
    pub fn from_env() -> SmtpResult<Self> {
        Self::new(ServerCredentials::from_env()?)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerCredentials {
        &self.config
    }

    /// Returns a reference to the metrics collector.
    pub fn metrics(&self) -> &SmtpMetrics {
        &self.metrics
    }

    /// Sends one message over a new connection.
    pub async fn send(&self, request: SendRequest) -> SmtpResult<SendResult> {
        let timer = Timer::start("smtp.send");
        let outcome = self
            .with_deadline(async {
                let mut transport = self.connect().await?;
                self.deliver(&mut transport, &request).await
            })
            .await;

        self.finish(&request, timer, outcome)
    }

    /// Sends one message over a transport the caller has already opened.
    ///
    /// The transport is closed when this returns, including when the
    /// deadline cuts the dialogue short.
    pub async fn send_with_transport<T: SmtpTransport>(
        &self,
        mut transport: T,
        request: SendRequest,
    ) -> SmtpResult<SendResult> {
        let timer = Timer::start("smtp.send");
        let outcome = self.with_deadline(self.deliver(&mut transport, &request)).await;

        if matches!(&outcome, Err(e) if e.kind() == SmtpErrorKind::Timeout) {
            let _ = transport.close().await;
        }

        self.finish(&request, timer, outcome)
    }

    /// Sends several independent messages concurrently, one connection each.
    pub async fn send_batch(&self, requests: Vec<SendRequest>) -> BatchSendResult {
        let start = Instant::now();
        let total = requests.len();

        let results = join_all(requests.into_iter().map(|request| self.send(request))).await;
        let succeeded = results.iter().filter(|r| r.is_ok()).count();

        BatchSendResult {
            results,
            total,
            succeeded,
            failed: total - succeeded,
            duration: start.elapsed(),
        }
    }

    async fn connect(&self) -> SmtpResult<TcpTransport> {
        let result = TcpTransport::connect(&self.config).await;
        self.metrics.record_connection_attempt(result.is_ok());
        result
    }

    async fn deliver<T: SmtpTransport>(
        &self,
        transport: &mut T,
        request: &SendRequest,
    ) -> SmtpResult<SmtpResponse> {
        let message = self.composer.compose(request);
        SmtpDialogue::new(transport, &self.config)
            .with_metrics(&self.metrics)
            .run(request.recipient(), &message)
            .await
    }

    /// Bounds a whole send by the configured deadline. Dropping the inner
    /// future drops its transport, which releases the socket.
    async fn with_deadline<F>(&self, send: F) -> SmtpResult<SmtpResponse>
    where
        F: Future<Output = SmtpResult<SmtpResponse>>,
    {
        let limit = self.config.send_timeout;
        timeout(limit, send).await.unwrap_or_else(|_| {
            Err(SmtpError::new(
                SmtpErrorKind::Timeout,
                format!("Send did not complete within {}s", limit.as_secs_f32()),
            ))
        })
    }

    fn finish(
        &self,
        request: &SendRequest,
        timer: Timer,
        outcome: SmtpResult<SmtpResponse>,
    ) -> SmtpResult<SendResult> {
        let duration = timer.stop();

        match outcome {
            Ok(response) => {
                self.metrics.record_send_success();
                tracing::info!(
                    recipient = %request.recipient(),
                    duration_ms = duration.as_millis() as u64,
                    "Email sent"
                );
                Ok(SendResult {
                    recipient: request.recipient().to_string(),
                    response: response.raw(),
                    duration,
                })
            }
            Err(e) => {
                self.metrics.record_send_failure();
                tracing::warn!(
                    recipient = %request.recipient(),
                    kind = ?e.kind(),
                    code = ?e.smtp_code(),
                    "Email send failed"
                );
                Err(e)
            }
        }
    }
}
