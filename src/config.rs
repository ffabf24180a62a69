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

//! Appender properties.
//!
//! [`AppenderConfig`] can be built in code or deserialized with serde from any
//! format using the camelCase property names (`smtpHost`, `allowInvalidCerts`,
//! ...). Credentials are base64-encoded as soon as they are assigned.

use std::{fmt::Debug, time::Duration};

use serde::{Deserialize, Deserializer};

use crate::{
    smtp::{
        address::{parse_list, Recipients},
        auth::{self, Credentials},
    },
    Error,
};

pub const DEFAULT_PORT: u16 = 25;
pub const DEFAULT_SUBJECT: &str = "Log4php Report";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_CHARSET: &str = "ISO-8859-1";

#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppenderConfig {
    pub smtp_host: Option<String>,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub from: Option<String>,
    #[serde(deserialize_with = "deserialize_addresses")]
    pub to: Vec<String>,
    #[serde(deserialize_with = "deserialize_addresses")]
    pub cc: Vec<String>,
    #[serde(deserialize_with = "deserialize_addresses")]
    pub bcc: Vec<String>,
    pub subject: String,
    #[serde(deserialize_with = "deserialize_encoded")]
    pub(crate) username: Option<String>,
    #[serde(deserialize_with = "deserialize_encoded")]
    pub(crate) password: Option<String>,
    #[serde(rename = "ssl", deserialize_with = "deserialize_ssl")]
    pub starttls: bool,
    #[serde(deserialize_with = "deserialize_timeout")]
    pub timeout: u64,
    pub charset: String,
    pub single: bool,
    pub hostname: Option<String>,
    pub allow_invalid_certs: bool,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        AppenderConfig {
            smtp_host: None,
            port: DEFAULT_PORT,
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: DEFAULT_SUBJECT.to_string(),
            username: None,
            password: None,
            starttls: false,
            timeout: DEFAULT_TIMEOUT_SECS,
            charset: DEFAULT_CHARSET.to_string(),
            single: false,
            hostname: None,
            allow_invalid_certs: false,
        }
    }
}

impl AppenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn smtp_host(mut self, host: impl Into<String>) -> Self {
        self.smtp_host = Some(host.into());
        self
    }

    /// Sets the server port. Zero is ignored with a warning.
    pub fn port(mut self, port: u16) -> Self {
        if port > 0 {
            self.port = port;
        } else {
            tracing::warn!(property = "port", value = port, "Invalid value, ignoring");
        }
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the To list from a single address or a comma separated list.
    pub fn to(mut self, addresses: impl AsRef<str>) -> Self {
        self.to = parse_list(addresses.as_ref());
        self
    }

    pub fn cc(mut self, addresses: impl AsRef<str>) -> Self {
        self.cc = parse_list(addresses.as_ref());
        self
    }

    pub fn bcc(mut self, addresses: impl AsRef<str>) -> Self {
        self.bcc = parse_list(addresses.as_ref());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn username(mut self, username: impl AsRef<[u8]>) -> Self {
        self.username = Some(auth::encode(username));
        self
    }

    pub fn password(mut self, password: impl AsRef<[u8]>) -> Self {
        self.password = Some(auth::encode(password));
        self
    }

    /// Enables STARTTLS when `ssl` is exactly `tls`.
    pub fn ssl(mut self, ssl: impl AsRef<str>) -> Self {
        self.starttls = ssl.as_ref() == "tls";
        self
    }

    /// Sets the timeout in seconds. Zero is ignored with a warning.
    pub fn timeout(mut self, seconds: u64) -> Self {
        if seconds > 0 {
            self.timeout = seconds;
        } else {
            tracing::warn!(property = "timeout", value = seconds, "Invalid value, ignoring");
        }
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Sends one message per event instead of one report on close.
    pub fn single(mut self, single: bool) -> Self {
        self.single = single;
        self
    }

    /// Overrides the local host name used in EHLO/HELO and Message-IDs.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn allow_invalid_certs(mut self, allow_invalid_certs: bool) -> Self {
        self.allow_invalid_certs = allow_invalid_certs;
        self
    }

    pub fn recipients(&self) -> Recipients {
        Recipients::new()
            .to(self.to.iter().cloned())
            .cc(self.cc.iter().cloned())
            .bcc(self.bcc.iter().cloned())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        Some(Credentials::from_encoded(
            self.username.clone()?,
            self.password.clone()?,
        ))
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Checks that every required property is set, in the order smtpHost,
    /// username, password, from, to.
    pub fn validate(&self) -> crate::Result<()> {
        if is_blank(&self.smtp_host) {
            Err(Error::MissingParameter("smtpHost"))
        } else if is_blank(&self.username) {
            Err(Error::MissingParameter("username"))
        } else if is_blank(&self.password) {
            Err(Error::MissingParameter("password"))
        } else if is_blank(&self.from) {
            Err(Error::MissingParameter("from"))
        } else if self.to.is_empty() {
            Err(Error::MissingParameter("to"))
        } else {
            Ok(())
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |value| value.trim().is_empty())
}

impl Debug for AppenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppenderConfig")
            .field("smtp_host", &self.smtp_host)
            .field("port", &self.port)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cc", &self.cc)
            .field("bcc", &self.bcc)
            .field("subject", &self.subject)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("starttls", &self.starttls)
            .field("timeout", &self.timeout)
            .field("charset", &self.charset)
            .field("single", &self.single)
            .field("hostname", &self.hostname)
            .field("allow_invalid_certs", &self.allow_invalid_certs)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AddressList {
    One(String),
    Many(Vec<String>),
}

fn deserialize_addresses<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match AddressList::deserialize(deserializer)? {
        AddressList::One(addresses) => parse_list(&addresses),
        AddressList::Many(addresses) => addresses
            .iter()
            .flat_map(|addresses| parse_list(addresses))
            .collect(),
    })
}

fn deserialize_encoded<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Some(auth::encode(String::deserialize(deserializer)?)))
}

fn deserialize_ssl<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(String::deserialize(deserializer)? == "tls")
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    match u16::try_from(value) {
        Ok(port) if port > 0 => Ok(port),
        _ => {
            tracing::warn!(property = "port", value, "Invalid value, using default");
            Ok(DEFAULT_PORT)
        }
    }
}

fn deserialize_timeout<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    match u64::try_from(value) {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => {
            tracing::warn!(property = "timeout", value, "Invalid value, using default");
            Ok(DEFAULT_TIMEOUT_SECS)
        }
    }
}
