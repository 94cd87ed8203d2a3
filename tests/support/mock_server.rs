//! Mock SMTP server for integration tests
//!
//! Listens on an ephemeral loopback port, answers each stage with a
//! configurable reply and records what it received.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::Mutex,
    task::JoinHandle,
};

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Message content without the terminating dot
    Message(String),
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
struct Reply {
    code: u16,
    message: String,
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
struct MockServerConfig {
    greeting: Reply,
    ehlo: Vec<String>,
    mail_from: Reply,
    rcpt_to: Reply,
    data: Reply,
    data_end: Reply,
    quit: Reply,
    greeting_delay: Option<Duration>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: Reply::new(220, "mock ESMTP ready"),
            ehlo: vec!["mock.test".to_string(), "PIPELINING".to_string(), "SIZE 10000".to_string()],
            mail_from: Reply::new(250, "2.1.0 OK"),
            rcpt_to: Reply::new(250, "2.1.5 OK"),
            data: Reply::new(354, "End data with <CR><LF>.<CR><LF>"),
            data_end: Reply::new(250, "2.0.0 OK: queued"),
            quit: Reply::new(221, "2.0.0 Bye"),
            greeting_delay: None,
        }
    }
}

/// Mock SMTP server, stopped when dropped
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands: Arc<Mutex<Vec<SmtpCommand>>>,
    connections: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl MockSmtpServer {
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder {
            config: MockServerConfig::default(),
        }
    }

    /// Server that accepts every message
    pub async fn accepting() -> Self {
        Self::builder().build().await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands.lock().await.clone()
    }

    /// Message bodies received so far
    pub async fn messages(&self) -> Vec<String> {
        self.commands()
            .await
            .into_iter()
            .filter_map(|command| match command {
                SmtpCommand::Message(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<Mutex<Vec<SmtpCommand>>>,
    ) -> std::io::Result<()> {
        if let Some(delay) = config.greeting_delay {
            tokio::time::sleep(delay).await;
        }

        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        writer.write_all(&config.greeting.to_bytes()).await?;

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }

            let command_line = line.trim_end().to_string();
            let (verb, argument) = command_line
                .split_once(' ')
                .map(|(verb, rest)| (verb.to_uppercase(), rest.to_string()))
                .unwrap_or_else(|| (command_line.to_uppercase(), String::new()));

            let (reply, command) = match verb.as_str() {
                "EHLO" => (ehlo_bytes(&config.ehlo), SmtpCommand::Ehlo(argument)),
                "HELO" => (Reply::new(250, "hello").to_bytes(), SmtpCommand::Helo(argument)),
                "MAIL" => (config.mail_from.to_bytes(), SmtpCommand::MailFrom(argument)),
                "RCPT" => (config.rcpt_to.to_bytes(), SmtpCommand::RcptTo(argument)),
                "DATA" => (config.data.to_bytes(), SmtpCommand::Data),
                "QUIT" => {
                    commands.lock().await.push(SmtpCommand::Quit);
                    writer.write_all(&config.quit.to_bytes()).await?;
                    return Ok(());
                }
                _ => (
                    Reply::new(500, "5.5.2 command unrecognized").to_bytes(),
                    SmtpCommand::Other(command_line.clone()),
                ),
            };

            let is_data = command == SmtpCommand::Data;
            commands.lock().await.push(command);
            writer.write_all(&reply).await?;

            if is_data && config.data.code == 354 {
                let mut message = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line.trim_end() == "." {
                        break;
                    }
                    message.push_str(&line);
                }
                commands.lock().await.push(SmtpCommand::Message(message));
                writer.write_all(&config.data_end.to_bytes()).await?;
            }
        }
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn ehlo_bytes(capabilities: &[String]) -> Vec<u8> {
    let last = capabilities.len().saturating_sub(1);
    capabilities
        .iter()
        .enumerate()
        .map(|(i, capability)| {
            let separator = if i == last { ' ' } else { '-' };
            format!("250{}{}\r\n", separator, capability)
        })
        .collect::<String>()
        .into_bytes()
}

/// Builder for configuring a [`MockSmtpServer`]
pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = Reply::new(code, message);
        self
    }

    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from = Reply::new(code, message);
        self
    }

    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to = Reply::new(code, message);
        self
    }

    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end = Reply::new(code, message);
        self
    }

    /// Wait this long after accepting before sending the greeting
    pub fn with_greeting_delay(mut self, delay: Duration) -> Self {
        self.config.greeting_delay = Some(delay);
        self
    }

    /// Bind to an ephemeral loopback port and start serving
    pub async fn build(self) -> MockSmtpServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = Arc::new(self.config);
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let task = {
            let commands = Arc::clone(&commands);
            let connections = Arc::clone(&connections);
            tokio::spawn(async move {
                while let Ok((stream, _peer)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands);
                    tokio::spawn(async move {
                        let _ = MockSmtpServer::handle_client(stream, config, commands).await;
                    });
                }
            })
        };

        MockSmtpServer {
            addr,
            commands,
            connections,
            task,
        }
    }
}
