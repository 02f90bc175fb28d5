//! End-to-end sends against a local mock SMTP server.

mod support;

use std::time::Duration;

use site_mailer::{
    EmailHandler, SendRequest, ServerCredentials, SmtpClient, SmtpErrorKind,
};
use support::mock_server::MockSmtpServer;

fn client_for(server: &MockSmtpServer) -> SmtpClient {
    let config = ServerCredentials::builder()
        .host("127.0.0.1")
        .port(server.port())
        .credentials("user", "pass")
        .from_address("info@example.com")
        .no_tls()
        .command_timeout(Duration::from_secs(5))
        .send_timeout(Duration::from_secs(10))
        .build()
        .unwrap();
    SmtpClient::new(config).unwrap()
}

fn request(to: &str) -> SendRequest {
    SendRequest::new(to, "Thank you", "<p>Hi</p>", Some("Hi".to_string())).unwrap()
}

#[tokio::test]
async fn sends_multipart_message() {
    let server = MockSmtpServer::builder().build().await.unwrap();
    let client = client_for(&server);

    let result = client.send(request("visitor@example.org")).await.unwrap();
    assert_eq!(result.recipient, "visitor@example.org");
    assert_eq!(result.response, "250 2.0.0 Ok: queued");

    let sessions = server.wait_for_sessions(1).await;
    let session = &sessions[0];
    assert_eq!(
        session.lines,
        [
            "EHLO localhost",
            "AUTH LOGIN",
            "dXNlcg==",
            "cGFzcw==",
            "MAIL FROM:<info@example.com>",
            "RCPT TO:<visitor@example.org>",
            "DATA",
            "QUIT",
        ]
    );

    let message = session.message.as_deref().unwrap();
    assert!(message.contains("Subject: Thank you\r\n"));
    assert!(message.contains("Content-Type: text/plain; charset=utf-8\r\n\r\nHi\r\n"));
    assert!(message.contains("Content-Type: text/html; charset=utf-8\r\n\r\n<p>Hi</p>\r\n"));
    assert!(message.contains("Content-Type: multipart/alternative; boundary="));

    let snapshot = client.metrics().snapshot();
    assert_eq!(snapshot.emails_sent, 1);
    assert_eq!(snapshot.connection_attempts, 1);
}

#[tokio::test]
async fn concurrent_sends_are_isolated() {
    let server = MockSmtpServer::builder()
        .with_rejected_recipient("nobody@example.org", 550, "5.1.1 User unknown")
        .build()
        .await
        .unwrap();
    let client = client_for(&server);

    let (good, bad) = tokio::join!(
        client.send(request("visitor@example.org")),
        client.send(request("nobody@example.org")),
    );

    assert!(good.is_ok());
    let err = bad.unwrap_err();
    assert_eq!(err.kind(), SmtpErrorKind::RecipientRejected);
    assert_eq!(err.smtp_code(), Some(550));
    assert_eq!(err.message(), "550 5.1.1 User unknown");

    let sessions = server.wait_for_sessions(2).await;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions.iter().filter(|s| s.message.is_some()).count(), 1);
}

#[tokio::test]
async fn batch_reports_each_outcome() {
    let server = MockSmtpServer::builder()
        .with_rejected_recipient("nobody@example.org", 550, "5.1.1 User unknown")
        .build()
        .await
        .unwrap();
    let client = client_for(&server);

    let batch = client
        .send_batch(vec![
            request("visitor@example.org"),
            request("nobody@example.org"),
            request("operator@example.com"),
        ])
        .await;

    assert_eq!(batch.total, 3);
    assert_eq!(batch.succeeded, 2);
    assert_eq!(batch.failed, 1);
    assert!(!batch.all_succeeded());
    assert!(batch.results[1].is_err());
}

#[tokio::test]
async fn auth_failure_stops_before_mail_from() {
    let server = MockSmtpServer::builder()
        .with_auth_result(535, "5.7.8 Authentication credentials invalid")
        .build()
        .await
        .unwrap();
    let client = client_for(&server);

    let err = client.send(request("visitor@example.org")).await.unwrap_err();
    assert_eq!(err.kind(), SmtpErrorKind::Auth);
    assert_eq!(err.smtp_code(), Some(535));
    assert!(!err.to_string().contains("cGFzcw=="));

    let sessions = server.wait_for_sessions(1).await;
    assert_eq!(sessions[0].lines.len(), 4);
    assert!(sessions[0].message.is_none());
}

#[tokio::test]
async fn bad_greeting_is_reported() {
    let server = MockSmtpServer::builder()
        .with_greeting(554, "5.3.2 No service")
        .build()
        .await
        .unwrap();
    let client = client_for(&server);

    let err = client.send(request("visitor@example.org")).await.unwrap_err();
    assert_eq!(err.kind(), SmtpErrorKind::Greeting);
    assert_eq!(err.smtp_code(), Some(554));
}

#[tokio::test]
async fn dot_lines_survive_transmission() {
    let server = MockSmtpServer::builder().build().await.unwrap();
    let client = client_for(&server);

    let request = SendRequest::new(
        "visitor@example.org",
        "Dots",
        "<p>x</p>",
        Some("line one\n.\nline three".to_string()),
    )
    .unwrap();
    client.send(request).await.unwrap();

    let sessions = server.wait_for_sessions(1).await;
    let message = sessions[0].message.as_deref().unwrap();
    assert!(message.contains("line one\r\n..\r\nline three\r\n"));
}

#[tokio::test]
async fn handler_round_trip() {
    let server = MockSmtpServer::builder().build().await.unwrap();
    let handler = EmailHandler::new(client_for(&server));

    let body = serde_json::json!({
        "to": "visitor@example.org",
        "subject": "Thank you",
        "html": "<p>Hi</p>",
        "text": "Hi"
    });
    let reply = handler.handle(body.to_string().as_bytes()).await;

    assert_eq!(reply.status, 200);
    assert_eq!(
        reply.to_json(),
        r#"{"success":true,"message":"Email sent successfully"}"#
    );
}

#[tokio::test]
async fn handler_reports_rejected_recipient() {
    let server = MockSmtpServer::builder()
        .with_rejected_recipient("nobody@example.org", 550, "5.1.1 User unknown")
        .build()
        .await
        .unwrap();
    let handler = EmailHandler::new(client_for(&server));

    let body = serde_json::json!({
        "to": "nobody@example.org",
        "subject": "Thank you",
        "html": "<p>Hi</p>"
    });
    let reply = handler.handle(body.to_string().as_bytes()).await;

    assert_eq!(reply.status, 500);
    assert!(!reply.body.success);
    assert_eq!(
        reply.body.error.as_deref(),
        Some("Failed to send email: Recipient rejected")
    );

    let sessions = server.wait_for_sessions(1).await;
    assert!(sessions[0].message.is_none());
}
