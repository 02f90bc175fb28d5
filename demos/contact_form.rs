//! Contact Form Example
//!
//! This example demonstrates how to:
//! - Load the SMTP settings from `SMTP_*` environment variables
//! - Send the visitor confirmation and the operator notification as two
//!   independent messages
//! - Report each outcome separately
//!
//! Usage: `cargo run --example contact_form -- visitor@example.org operator@example.com`

use site_mailer::{SendRequest, SmtpClient, SmtpError};

#[tokio::main]
async fn main() -> Result<(), SmtpError> {
    let mut args = std::env::args().skip(1);
    let visitor = args.next().unwrap_or_else(|| "visitor@example.org".to_string());
    let operator = args.next().unwrap_or_else(|| "operator@example.com".to_string());

    // Fails here, before any connection, if SMTP_USER / SMTP_PASSWORD are unset
    let client = SmtpClient::from_env()?;
    println!("Using {} as {}", client.config().address(), client.config().from_address);

    let confirmation = SendRequest::new(
        visitor.as_str(),
        "Thank you for your message",
        r#"<p>Hello,</p>
<p>thank you for getting in touch. We will answer within two working days.</p>
<p>Best regards</p>"#,
        Some(
            "Hello,\n\nthank you for getting in touch. We will answer within two working days.\n\nBest regards"
                .to_string(),
        ),
    )?;

    let notification = SendRequest::new(
        operator.as_str(),
        format!("New contact request from {}", visitor),
        format!("<p>New contact request from <strong>{}</strong>.</p>", visitor),
        None,
    )?;

    let batch = client.send_batch(vec![confirmation, notification]).await;

    for (label, result) in ["confirmation", "notification"].iter().zip(&batch.results) {
        match result {
            Ok(sent) => println!("{}: accepted for {} in {:?}", label, sent.recipient, sent.duration),
            Err(e) => eprintln!("{}: failed: {}", label, e),
        }
    }

    println!(
        "{} of {} messages sent in {:?}",
        batch.succeeded, batch.total, batch.duration
    );

    Ok(())
}
