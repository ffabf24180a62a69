/*
 * Copyright Stalwart Labs Ltd. See the COPYING
 * file at the top-level directory of this distribution.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use chrono::Utc;

use crate::{
    config::AppenderConfig,
    hostname::{self, HostnameProvider, SystemHostname},
    layout::{Layout, LoggingEvent},
    smtp::{builder::SmtpClientBuilder, client::SmtpClient, message::Message},
    Error, ErrorKind,
};

const BASE36_DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppenderState {
    Ready,
    Closed(CloseReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `close` was called.
    Shutdown,
    /// A required property was missing at construction.
    Misconfigured(&'static str),
    /// A send attempt failed.
    Failed(ErrorKind),
}

/// Log sink that mails the rendered events.
///
/// By default events accumulate in one report that is sent when the appender
/// is closed. In single mode every event is sent as its own message.
pub struct SmtpAppender<L: Layout> {
    config: AppenderConfig,
    layout: L,
    state: AppenderState,
    hostname: String,
    message_id: String,
    body: String,
}

impl<L: Layout> SmtpAppender<L> {
    /// Creates an appender that takes the local host name from the system.
    pub fn new(config: AppenderConfig, layout: L) -> Self {
        Self::with_hostname_provider(config, layout, &SystemHostname)
    }

    /// Creates an appender, validating the configuration. A missing required
    /// property leaves the appender closed; it never connects.
    pub fn with_hostname_provider(
        config: AppenderConfig,
        layout: L,
        provider: &dyn HostnameProvider,
    ) -> Self {
        let hostname = hostname::resolve(config.hostname.as_deref(), provider);
        let state = match config.validate() {
            Ok(()) => AppenderState::Ready,
            Err(Error::MissingParameter(name)) => {
                tracing::warn!(property = name, "Required parameter not set, closing appender");
                AppenderState::Closed(CloseReason::Misconfigured(name))
            }
            Err(err) => {
                tracing::warn!(%err, "Invalid configuration, closing appender");
                AppenderState::Closed(CloseReason::Failed(err.kind()))
            }
        };

        SmtpAppender {
            message_id: generate_message_id(&hostname),
            hostname,
            config,
            layout,
            state,
            body: String::new(),
        }
    }

    pub fn state(&self) -> AppenderState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, AppenderState::Closed(_))
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Rendered events not sent yet.
    pub fn pending(&self) -> &str {
        &self.body
    }

    /// Renders `event` and adds it to the pending report. In single mode the
    /// event is sent right away; a failed send closes the appender.
    pub async fn append(&mut self, event: &LoggingEvent<'_>) -> crate::Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }

        self.body.push_str(&self.layout.format(event));

        if self.config.single {
            let result = self.flush().await;
            if let Err(err) = &result {
                self.state = AppenderState::Closed(CloseReason::Failed(err.kind()));
            }
            result
        } else {
            Ok(())
        }
    }

    /// Sends the pending report, if any, and closes the appender.
    ///
    /// A report without events is not sent, even when the layout has a
    /// header or footer.
    pub async fn close(&mut self) -> crate::Result<()> {
        if self.is_closed() {
            return Ok(());
        }

        let result = if self.body.is_empty() {
            Ok(())
        } else {
            self.flush().await
        };

        self.state = AppenderState::Closed(match &result {
            Ok(()) => CloseReason::Shutdown,
            Err(err) => CloseReason::Failed(err.kind()),
        });
        result
    }

    /// Runs one SMTP session for the pending body. The body is cleared
    /// whatever the outcome.
    async fn flush(&mut self) -> crate::Result<()> {
        let body = std::mem::take(&mut self.body);
        let credentials = self
            .config
            .credentials()
            .ok_or(Error::MissingParameter("username"))?;
        let recipients = self.config.recipients();

        let message = Message::new(self.config.from.as_deref().unwrap_or_default(), &recipients)
            .message_id(self.message_id.as_str())
            .subject(self.config.subject.as_str())
            .content_type(self.layout.content_type())
            .charset(self.config.charset.as_str())
            .header(self.layout.header())
            .body(body)
            .footer(self.layout.footer());

        self.client().send(&credentials, &message).await
    }

    fn client(&self) -> SmtpClient {
        let builder = SmtpClientBuilder::new(
            self.config.smtp_host.as_deref().unwrap_or_default(),
            self.config.port,
        )
        .timeout(self.config.timeout_duration())
        .starttls(self.config.starttls)
        .helo_host(self.hostname.as_str());

        if self.config.allow_invalid_certs {
            builder.allow_invalid_certs().build()
        } else {
            builder.build()
        }
    }
}

/// Builds `<base36(microseconds).base36(md5(random))@hostname>`.
pub fn generate_message_id(hostname: &str) -> String {
    let timestamp = u128::try_from(Utc::now().timestamp_micros()).unwrap_or_default();
    let digest = md5::compute(rand::random::<u64>().to_le_bytes());

    format!(
        "<{}.{}@{}>",
        base36(timestamp),
        base36(u128::from_be_bytes(digest.0)),
        hostname
    )
}

fn base36(mut value: u128) -> String {
    let mut digits = Vec::with_capacity(25);
    loop {
        digits.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
        if value == 0 {
            break;
        }
    }
    digits.iter().rev().map(|&digit| digit as char).collect()
}

#[cfg(test)]
mod test {
    use std::borrow::Cow;

    use crate::{
        config::AppenderConfig,
        hostname::FixedHostname,
        layout::{Layout, Level, LoggingEvent, SimpleLayout},
        smtp::mock::MockServer,
        Error, ErrorKind,
    };

    use super::{base36, generate_message_id, AppenderState, CloseReason, SmtpAppender};

    const SESSION: &[&str] = &[
        "220 localhost ESMTP",
        "250 localhost",
        "250 OK",
        "334 VXNlcm5hbWU6",
        "235 Authenticated",
        "250 OK",
        "250 OK",
        "354 Go ahead",
        "250 Queued",
        "221 Bye",
    ];

    struct MessageOnly;

    impl Layout for MessageOnly {
        fn format(&self, event: &LoggingEvent<'_>) -> String {
            event.message.to_string()
        }
    }

    struct Report;

    impl Layout for Report {
        fn format(&self, event: &LoggingEvent<'_>) -> String {
            format!("* {}\n", event.message)
        }

        fn header(&self) -> Cow<'_, str> {
            Cow::Borrowed("Report\n")
        }

        fn footer(&self) -> Cow<'_, str> {
            Cow::Borrowed("End of report\n")
        }

        fn content_type(&self) -> Cow<'_, str> {
            Cow::Borrowed("text/x-report")
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn config(port: u16) -> AppenderConfig {
        AppenderConfig::new()
            .smtp_host("127.0.0.1")
            .port(port)
            .username("u")
            .password("p")
            .from("a@x.com")
            .to("b@x.com")
    }

    fn data_section(transcript: &[String]) -> &[String] {
        let start = transcript.iter().position(|line| line == "DATA").unwrap() + 1;
        let end = transcript.iter().position(|line| line == ".").unwrap();
        &transcript[start..end]
    }

    #[tokio::test]
    async fn send_on_close() {
        init_tracing();
        let server = MockServer::start(SESSION, 1).await;

        let mut appender = SmtpAppender::with_hostname_provider(
            config(server.port),
            MessageOnly,
            &FixedHostname("app01.example.com".to_string()),
        );
        assert_eq!(appender.state(), AppenderState::Ready);
        appender
            .append(&LoggingEvent::new(Level::Info, "main", "hello"))
            .await
            .unwrap();
        assert_eq!(appender.pending(), "hello");
        appender.close().await.unwrap();
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Shutdown)
        );
        assert!(appender.pending().is_empty());

        let transcript = server.transcripts().await.remove(0);
        assert_eq!(
            &transcript[..7],
            &[
                "EHLO app01.example.com",
                "AUTH LOGIN",
                "dQ==",
                "cA==",
                "MAIL FROM:<a@x.com>",
                "RCPT TO:<b@x.com>",
                "DATA",
            ]
        );
        assert_eq!(
            &transcript[transcript.len() - 4..],
            &["hello", "", ".", "QUIT"]
        );

        let data = data_section(&transcript);
        assert_eq!(data[0], format!("Message-ID: {}", appender.message_id()));
        assert!(data[1].starts_with("Date: "));
        assert_eq!(
            &data[2..10],
            &[
                "Subject: Log4php Report",
                "From: a@x.com",
                "To: <b@x.com>",
                "MIME-Version: 1.0",
                "Content-Type: text/plain; charset=ISO-8859-1",
                "Content-Transfer-Encoding: 8BIT",
                "",
                "hello",
            ]
        );

        // Closed appenders refuse events and closing twice is harmless.
        assert!(matches!(
            appender
                .append(&LoggingEvent::new(Level::Info, "main", "late"))
                .await,
            Err(Error::Closed)
        ));
        appender.close().await.unwrap();
    }

    #[tokio::test]
    async fn report_layout() {
        init_tracing();
        let server = MockServer::start(SESSION, 1).await;

        let mut appender = SmtpAppender::new(
            config(server.port).cc("c@x.com").subject("Nightly"),
            Report,
        );
        for message in ["first", "second"] {
            appender
                .append(&LoggingEvent::new(Level::Warn, "jobs", message))
                .await
                .unwrap();
        }
        appender.close().await.unwrap();

        let transcripts = server.transcripts().await;
        let data = data_section(&transcripts[0]);
        assert!(data.contains(&"Cc: <c@x.com>".to_string()));
        assert!(data.contains(&"Subject: Nightly".to_string()));
        assert!(data.contains(&"Content-Type: text/x-report; charset=ISO-8859-1".to_string()));
        let body = data.iter().position(|line| line == "Report").unwrap();
        assert_eq!(
            &data[body..],
            &["Report", "* first", "* second", "End of report", "", ""]
        );
    }

    #[tokio::test]
    async fn single_mode() {
        init_tracing();
        let server = MockServer::start(SESSION, 2).await;

        let mut appender = SmtpAppender::new(config(server.port).single(true), SimpleLayout);
        appender
            .append(&LoggingEvent::new(Level::Error, "main", "first event"))
            .await
            .unwrap();
        assert!(appender.pending().is_empty());
        assert_eq!(appender.state(), AppenderState::Ready);
        appender
            .append(&LoggingEvent::new(Level::Error, "main", "second event"))
            .await
            .unwrap();

        // Nothing left to send.
        appender.close().await.unwrap();
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Shutdown)
        );

        let transcripts = server.transcripts().await;
        assert_eq!(transcripts.len(), 2);
        for (transcript, (expected, other)) in transcripts.iter().zip([
            ("ERROR - first event", "ERROR - second event"),
            ("ERROR - second event", "ERROR - first event"),
        ]) {
            let data = data_section(transcript);
            assert!(data.iter().any(|line| line == expected));
            assert!(!data.iter().any(|line| line == other));
        }
    }

    #[tokio::test]
    async fn misconfigured() {
        init_tracing();
        let mut appender = SmtpAppender::new(
            AppenderConfig::new()
                .smtp_host("127.0.0.1")
                .username("u")
                .from("a@x.com")
                .to("b@x.com"),
            SimpleLayout,
        );
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Misconfigured("password"))
        );
        assert!(matches!(
            appender
                .append(&LoggingEvent::new(Level::Error, "main", "lost"))
                .await,
            Err(Error::Closed)
        ));
        assert!(appender.pending().is_empty());
        appender.close().await.unwrap();
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Misconfigured("password"))
        );

        let appender = SmtpAppender::new(AppenderConfig::new().from("a@x.com"), SimpleLayout);
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Misconfigured("smtpHost"))
        );
    }

    #[tokio::test]
    async fn failed_send() {
        init_tracing();
        let server = MockServer::start(
            &[
                "220 localhost",
                "250 localhost",
                "250 OK",
                "334 VXNlcm5hbWU6",
                "535 Authentication failed",
            ],
            1,
        )
        .await;

        let mut appender = SmtpAppender::new(config(server.port).single(true), SimpleLayout);
        let err = appender
            .append(&LoggingEvent::new(Level::Error, "main", "first"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(
            err.to_string(),
            "Password not accepted from server: 535 Authentication failed"
        );
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Failed(ErrorKind::Protocol))
        );
        assert!(appender.pending().is_empty());

        let transcript = server.transcripts().await.remove(0);
        assert!(!transcript.iter().any(|line| line.starts_with("MAIL")));
    }

    #[tokio::test]
    async fn unreachable_server() {
        init_tracing();
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut appender = SmtpAppender::new(config(port), SimpleLayout);
        appender
            .append(&LoggingEvent::new(Level::Error, "main", "nobody listens"))
            .await
            .unwrap();
        let err = appender.close().await.unwrap_err();
        assert!(matches!(err, Error::Connect { .. }));
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Failed(ErrorKind::Connection))
        );
    }

    #[tokio::test]
    async fn close_without_events() {
        init_tracing();
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        // Nothing listens on the port, so any connection attempt would fail.
        let mut appender = SmtpAppender::new(config(port), Report);
        assert!(appender.pending().is_empty());
        appender.close().await.unwrap();
        assert_eq!(
            appender.state(),
            AppenderState::Closed(CloseReason::Shutdown)
        );
    }

    #[test]
    fn message_id() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(u128::MAX), "f5lxx1zz5pnorynqglhzmsp33");

        let id = generate_message_id("app01.example.com");
        assert!(id.starts_with('<') && id.ends_with("@app01.example.com>"));
        let (timestamp, hash) = id[1..id.find('@').unwrap()].split_once('.').unwrap();
        assert!(!timestamp.is_empty() && !hash.is_empty());
        assert!(timestamp
            .chars()
            .chain(hash.chars())
            .all(|ch| ch.is_ascii_digit() || ch.is_ascii_lowercase()));
        assert_ne!(id, generate_message_id("app01.example.com"));
    }
}
