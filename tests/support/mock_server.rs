//! Mock SMTP server for integration tests.
//!
//! Plain TCP, one task per connection. Replies are configured per command;
//! recipients can be rejected individually so concurrent sessions can be
//! given different outcomes. Every received line is recorded.

#![allow(dead_code)] // Not every test uses every knob.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

/// Reply line configuration.
#[derive(Debug, Clone)]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

impl Reply {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Debug, Clone)]
struct ServerConfig {
    greeting: Reply,
    ehlo_lines: Vec<String>,
    auth_result: Reply,
    mail_from: Reply,
    rcpt_to: Reply,
    rejected_recipients: HashMap<String, Reply>,
    data: Reply,
    data_end: Reply,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock.example.com ESMTP ready"),
            ehlo_lines: vec![
                "mock.example.com".to_string(),
                "SIZE 10485760".to_string(),
                "AUTH LOGIN PLAIN".to_string(),
            ],
            auth_result: Reply::new(235, "2.7.0 Authentication successful"),
            mail_from: Reply::new(250, "2.1.0 OK"),
            rcpt_to: Reply::new(250, "2.1.5 OK"),
            rejected_recipients: HashMap::new(),
            data: Reply::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end: Reply::new(250, "2.0.0 Ok: queued"),
        }
    }
}

/// What one client connection did.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Command lines, including the two AUTH LOGIN credential lines.
    pub lines: Vec<String>,
    /// Message content between DATA and the terminating `.`, CRLF intact.
    pub message: Option<String>,
}

/// Mock SMTP server bound to a random local port.
pub struct MockSmtpServer {
    addr: SocketAddr,
    sessions: Arc<Mutex<Vec<Session>>>,
}

impl MockSmtpServer {
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: ServerConfig::default(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Completed sessions, in the order they ended.
    pub async fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().await.clone()
    }

    /// Waits until at least `count` sessions have ended.
    pub async fn wait_for_sessions(&self, count: usize) -> Vec<Session> {
        for _ in 0..200 {
            let sessions = self.sessions().await;
            if sessions.len() >= count {
                return sessions;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sessions().await
    }

    async fn handle_client(
        stream: TcpStream,
        config: Arc<ServerConfig>,
        session: &mut Session,
    ) -> std::io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(&config.greeting.to_bytes()).await?;
        if config.greeting.code != 220 {
            return Ok(());
        }

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            let command = line.trim_end().to_string();
            session.lines.push(command.clone());

            let verb = command
                .split([' ', ':'])
                .next()
                .unwrap_or("")
                .to_uppercase();

            let reply = match verb.as_str() {
                "EHLO" => {
                    let count = config.ehlo_lines.len();
                    let mut text = String::new();
                    for (i, capability) in config.ehlo_lines.iter().enumerate() {
                        let sep = if i + 1 < count { '-' } else { ' ' };
                        text.push_str(&format!("250{}{}\r\n", sep, capability));
                    }
                    writer.write_all(text.as_bytes()).await?;
                    continue;
                }
                "AUTH" => {
                    writer.write_all(b"334 VXNlcm5hbWU6\r\n").await?;
                    for challenge in [Some("334 UGFzc3dvcmQ6\r\n"), None] {
                        line.clear();
                        if reader.read_line(&mut line).await? == 0 {
                            return Ok(());
                        }
                        session.lines.push(line.trim_end().to_string());
                        if let Some(challenge) = challenge {
                            writer.write_all(challenge.as_bytes()).await?;
                        }
                    }
                    config.auth_result.clone()
                }
                "MAIL" => config.mail_from.clone(),
                "RCPT" => {
                    let address = command
                        .split_once('<')
                        .and_then(|(_, rest)| rest.split_once('>'))
                        .map(|(address, _)| address.to_string())
                        .unwrap_or_default();
                    config
                        .rejected_recipients
                        .get(&address)
                        .cloned()
                        .unwrap_or_else(|| config.rcpt_to.clone())
                }
                "DATA" => {
                    writer.write_all(&config.data.to_bytes()).await?;
                    if config.data.code != 354 {
                        continue;
                    }

                    let mut content = String::new();
                    loop {
                        line.clear();
                        if reader.read_line(&mut line).await? == 0 {
                            return Ok(());
                        }
                        if line == ".\r\n" {
                            break;
                        }
                        content.push_str(&line);
                    }
                    session.message = Some(content);
                    config.data_end.clone()
                }
                "QUIT" => {
                    // The client does not wait for this reply.
                    let _ = writer.write_all(b"221 2.0.0 Bye\r\n").await;
                    return Ok(());
                }
                _ => Reply::new(500, "5.5.2 Command not recognized"),
            };

            writer.write_all(&reply.to_bytes()).await?;
        }
    }
}

/// Builder for [`MockSmtpServer`].
pub struct MockSmtpServerBuilder {
    config: ServerConfig,
}

impl MockSmtpServerBuilder {
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = Reply::new(code, message);
        self
    }

    pub fn with_auth_result(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_result = Reply::new(code, message);
        self
    }

    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from = Reply::new(code, message);
        self
    }

    pub fn with_rejected_recipient(
        mut self,
        address: impl Into<String>,
        code: u16,
        message: impl Into<String>,
    ) -> Self {
        self.config
            .rejected_recipients
            .insert(address.into(), Reply::new(code, message));
        self
    }

    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, message);
        self
    }

    pub async fn build(self) -> std::io::Result<MockSmtpServer> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let config = Arc::new(self.config);
        let sessions = Arc::new(Mutex::new(Vec::new()));

        let sessions_clone = Arc::clone(&sessions);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let config = Arc::clone(&config);
                let sessions = Arc::clone(&sessions_clone);
                tokio::spawn(async move {
                    let mut session = Session::default();
                    if let Err(e) = MockSmtpServer::handle_client(stream, config, &mut session).await {
                        tracing::debug!("Mock server connection error: {}", e);
                    }
                    sessions.lock().await.push(session);
                });
            }
        });

        Ok(MockSmtpServer { addr, sessions })
    }
}
