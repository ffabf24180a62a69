/*
 * Copyright Stalwart Labs Ltd.
 *
 * Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
 * https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
 * <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
 * option. This file may not be copied, modified, or distributed
 * except according to those terms.
 */

use std::time::Duration;

use tokio_rustls::TlsConnector;

use crate::hostname::{resolve, SystemHostname};

use super::{
    client::{SessionState, SmtpClient},
    stream::SmtpStream,
    tls::build_tls_connector,
};

/// Default bound on each network exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

pub struct SmtpClientBuilder<T: AsRef<str>> {
    pub(crate) hostname: T,
    pub(crate) port: u16,
    pub(crate) timeout: Duration,
    pub(crate) tls_connector: TlsConnector,
    pub(crate) starttls: bool,
    pub(crate) local_host: String,
}

impl<T: AsRef<str>> SmtpClientBuilder<T> {
    pub fn new(hostname: T, port: u16) -> Self {
        SmtpClientBuilder {
            hostname,
            port,
            timeout: DEFAULT_TIMEOUT,
            tls_connector: build_tls_connector(false),
            starttls: false,
            local_host: resolve(None, &SystemHostname),
        }
    }

    /// Allow invalid TLS certificates
    pub fn allow_invalid_certs(mut self) -> Self {
        self.tls_connector = build_tls_connector(true);
        self
    }

    /// Upgrade the connection with STARTTLS after the greeting
    pub fn starttls(mut self, starttls: bool) -> Self {
        self.starttls = starttls;
        self
    }

    /// Set the EHLO/HELO hostname
    pub fn helo_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the connection and command timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Creates a disconnected client.
    pub fn build(self) -> SmtpClient {
        let hostname = self.hostname.as_ref().to_string();
        SmtpClient {
            stream: SmtpStream::None,
            timeout: self.timeout,
            state: SessionState::Disconnected,
            tls_hostname: hostname.clone(),
            host: hostname,
            port: self.port,
            tls_connector: self.tls_connector,
            starttls: self.starttls,
            local_host: self.local_host,
        }
    }
}
