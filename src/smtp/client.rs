/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::{fmt::Display, time::Duration};

use tokio::{io::BufReader, net::TcpStream, time};
use tokio_rustls::TlsConnector;

use crate::Error;

use super::{
    address::{is_valid, Recipients},
    auth::Credentials,
    message::Message,
    reply::{Reply, START_DATA, START_TLS_READY},
    stream::SmtpStream,
    AssertReply,
};

/// A single-use SMTP session.
///
/// Every step is a command/reply exchange bounded by the configured timeout.
/// The first failing step leaves the client in [`SessionState::Failed`] with
/// the connection dropped, and every later call returns [`Error::Closed`]
/// without touching the network.
pub struct SmtpClient {
    pub(crate) stream: SmtpStream,
    pub(crate) timeout: Duration,
    pub(crate) state: SessionState,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) tls_connector: TlsConnector,
    pub(crate) tls_hostname: String,
    pub(crate) starttls: bool,
    pub(crate) local_host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connected,
    Greeted,
    TlsUpgraded,
    Authenticated,
    EnvelopeOpen,
    DataSent,
    Closed,
    Failed,
}

/// Protocol step, used to report which exchange went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Connect,
    Hello,
    StartTls,
    Auth,
    AuthUsername,
    AuthPassword,
    MailFrom,
    RcptTo,
    Data,
    Message,
    Quit,
}

impl SmtpClient {
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns `true` once the connection has been upgraded with STARTTLS.
    pub fn is_secure(&self) -> bool {
        self.stream.is_secure()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_connected()
    }

    /// Opens the TCP connection and reads the server greeting.
    pub async fn connect(&mut self) -> crate::Result<()> {
        self.ensure_usable()?;
        if self.stream.is_connected() {
            let err = Error::AlreadyConnected;
            self.fail(&err);
            return Err(err);
        }

        let result: crate::Result<()> = async {
            let stream = time::timeout(
                self.timeout,
                TcpStream::connect((self.host.as_str(), self.port)),
            )
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|source| Error::Connect {
                addr: format!("{}:{}", self.host, self.port),
                source,
            })?;
            self.stream = SmtpStream::Basic(BufReader::new(stream));

            // The greeting is read but its code is not checked.
            let banner = time::timeout(self.timeout, self.read())
                .await
                .map_err(|_| Error::Timeout)??;
            tracing::debug!(host = %self.host, port = self.port, %banner, "Connected");
            Ok(())
        }
        .await;

        self.settle(result, SessionState::Connected)
    }

    /// Sends EHLO, falling back to HELO when EHLO is not accepted.
    pub async fn hello(&mut self) -> crate::Result<()> {
        self.ensure_usable()?;
        let host = if self.local_host.is_empty() {
            "localhost".to_string()
        } else {
            self.local_host.clone()
        };

        let result: crate::Result<()> = async {
            let reply = self.cmd(Step::Hello, &format!("EHLO {host}")).await?;
            if reply.is_success() {
                return Ok(());
            }
            tracing::debug!(%reply, "EHLO not accepted, trying HELO");
            self.cmd(Step::Hello, &format!("HELO {host}"))
                .await?
                .assert_success(Step::Hello)
        }
        .await;

        let next = if self.stream.is_secure() {
            SessionState::TlsUpgraded
        } else {
            SessionState::Greeted
        };
        self.settle(result, next)
    }

    /// Issues STARTTLS and upgrades the connection in place. Anything other
    /// than a `220` reply aborts the session without a handshake.
    pub async fn start_tls(&mut self) -> crate::Result<()> {
        self.ensure_usable()?;

        let result: crate::Result<()> = async {
            self.cmd(Step::StartTls, "STARTTLS")
                .await?
                .assert_code(START_TLS_READY, Step::StartTls)?;

            let stream = std::mem::take(&mut self.stream);
            self.stream = time::timeout(
                self.timeout,
                stream.upgrade_tls(&self.tls_connector, &self.tls_hostname),
            )
            .await
            .map_err(|_| Error::Timeout)??;
            Ok(())
        }
        .await;

        self.settle(result, SessionState::TlsUpgraded)
    }

    /// AUTH LOGIN exchange.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> crate::Result<()> {
        self.ensure_usable()?;

        let result: crate::Result<()> = async {
            self.cmd(Step::Auth, "AUTH LOGIN")
                .await?
                .assert_success(Step::Auth)?;
            self.cmd(Step::AuthUsername, credentials.encoded_username())
                .await?
                .assert_success(Step::AuthUsername)?;
            self.cmd(Step::AuthPassword, credentials.encoded_secret())
                .await?
                .assert_success(Step::AuthPassword)
        }
        .await;

        self.settle(result, SessionState::Authenticated)
    }

    /// Sends a MAIL FROM command.
    pub async fn mail_from(&mut self, from: &str) -> crate::Result<()> {
        self.ensure_usable()?;
        let result = self
            .cmd(Step::MailFrom, &format!("MAIL FROM:<{from}>"))
            .await
            .and_then(|reply| reply.assert_success(Step::MailFrom));
        self.settle(result, SessionState::EnvelopeOpen)
    }

    /// Sends one RCPT TO command per valid address, To first, then Cc and
    /// Bcc. Malformed addresses are never sent. If any address was malformed
    /// or refused, the session fails with all of them once the list is done.
    pub async fn add_recipients(&mut self, recipients: &Recipients) -> crate::Result<()> {
        self.ensure_usable()?;

        let result: crate::Result<()> = async {
            if recipients.is_empty() {
                return Err(Error::MissingParameter("to"));
            }

            let mut bad_recipients = Vec::new();
            for address in recipients.iter() {
                if !is_valid(address) {
                    tracing::warn!(address, "Invalid recipient address");
                    bad_recipients.push(address.to_string());
                    continue;
                }

                let reply = self
                    .cmd(Step::RcptTo, &format!("RCPT TO:<{address}>"))
                    .await?;
                if !reply.is_success() {
                    tracing::warn!(address, %reply, "Recipient not accepted");
                    bad_recipients.push(address.to_string());
                }
            }

            if bad_recipients.is_empty() {
                Ok(())
            } else {
                Err(Error::BadRecipients(bad_recipients))
            }
        }
        .await;

        self.settle(result, SessionState::EnvelopeOpen)
    }

    /// Sends DATA, then the message followed by the end-of-data marker.
    pub async fn data(&mut self, message: &[u8]) -> crate::Result<()> {
        self.ensure_usable()?;

        let result: crate::Result<()> = async {
            self.cmd(Step::Data, "DATA")
                .await?
                .assert_code(START_DATA, Step::Data)?;

            time::timeout(self.timeout, async {
                self.stream.write_message(message).await?;
                self.read().await
            })
            .await
            .map_err(|_| Error::Timeout)??
            .assert_success(Step::Message)
        }
        .await;

        self.settle(result, SessionState::DataSent)
    }

    /// Sends QUIT and closes the connection. A refused QUIT is only logged
    /// and reported; the connection is closed either way.
    pub async fn quit(&mut self) -> crate::Result<()> {
        self.ensure_usable()?;

        let result = self
            .cmd(Step::Quit, "QUIT")
            .await
            .and_then(|reply| reply.assert_success(Step::Quit));
        if let Err(err) = &result {
            tracing::warn!(%err, "QUIT failed");
        }

        if let Err(err) = self.stream.shutdown().await {
            tracing::debug!(%err, "Failed to shut down connection");
        }
        self.state = SessionState::Closed;
        result
    }

    /// Runs a complete session: connect, greet, optional STARTTLS, AUTH
    /// LOGIN, envelope, DATA and QUIT. The message counts as delivered once
    /// the server accepts the data; a failed QUIT does not change that.
    pub async fn send(
        &mut self,
        credentials: &Credentials,
        message: &Message<'_>,
    ) -> crate::Result<()> {
        self.connect().await?;
        self.hello().await?;
        if self.starttls {
            self.start_tls().await?;
            self.hello().await?;
        }
        self.authenticate(credentials).await?;
        self.mail_from(&message.from).await?;
        self.add_recipients(&message.recipients).await?;
        self.data(&message.render()).await?;
        let _ = self.quit().await;
        Ok(())
    }

    /// Sends a command line and waits for the reply.
    pub(crate) async fn cmd(&mut self, step: Step, line: &str) -> crate::Result<Reply> {
        if !self.stream.is_connected() {
            return Err(Error::NotConnected(step));
        }

        tracing::trace!(
            %step,
            command = if matches!(step, Step::AuthUsername | Step::AuthPassword) {
                "<credentials>"
            } else {
                line
            },
            "Sending command"
        );

        time::timeout(self.timeout, async {
            self.stream.write_line(line).await?;
            self.read().await
        })
        .await
        .map_err(|_| Error::Timeout)?
    }

    pub(crate) async fn read(&mut self) -> crate::Result<Reply> {
        let reply = self.stream.read_reply().await?;
        tracing::trace!(%reply, "Received reply");
        Ok(reply)
    }

    fn ensure_usable(&self) -> crate::Result<()> {
        match self.state {
            SessionState::Failed | SessionState::Closed => Err(Error::Closed),
            _ => Ok(()),
        }
    }

    fn settle<T>(&mut self, result: crate::Result<T>, next: SessionState) -> crate::Result<T> {
        match result {
            Ok(value) => {
                self.state = next;
                Ok(value)
            }
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    /// Marks the session failed and drops the connection.
    fn fail(&mut self, err: &Error) {
        let severity = match err {
            Error::Rejected { reply, .. } => Some(reply.severity()),
            _ => None,
        };
        tracing::warn!(kind = %err.kind(), ?severity, state = ?self.state, "{err}");
        self.state = SessionState::Failed;
        self.stream = SmtpStream::None;
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Step::Connect => "Connect",
            Step::Hello => "EHLO/HELO",
            Step::StartTls => "STARTTLS",
            Step::Auth => "AUTH",
            Step::AuthUsername => "Username",
            Step::AuthPassword => "Password",
            Step::MailFrom => "MAIL",
            Step::RcptTo => "RCPT",
            Step::Data => "DATA command",
            Step::Message => "DATA",
            Step::Quit => "QUIT",
        })
    }
}
