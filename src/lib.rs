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

//! # smtp-log-sink
//!
//! _smtp-log-sink_ is a log event sink that delivers formatted log records as
//! e-mail messages through a small, self-contained SMTP client. It includes the
//! following features:
//!
//! - Simple Mail Transfer Protocol (**SMTP**; _RFC 5321_) delivery with
//!   EHLO/HELO fallback.
//! - SMTP Service Extension for Secure SMTP over **TLS** (_RFC 3207_) through an
//!   in-place STARTTLS upgrade.
//! - **AUTH LOGIN** credential exchange.
//! - Message headers conforming to the Internet Message Format (_RFC 5322_),
//!   with _RFC 2047_ encoded subjects and charset conversion of the body.
//! - Line folding at the 998 character limit and dot-stuffing of the message
//!   content.
//! - One message per event or one report accumulated until shutdown.
//! - Full async (requires Tokio).
//!
//! ## Usage Example
//!
//! Mail every error-level record as soon as it is logged:
//!
//! ```rust
//!     let config = AppenderConfig::new()
//!         .smtp_host("smtp.example.com")
//!         .port(587)
//!         .ssl("tls")
//!         .username("john")
//!         .password("p4ssw0rd")
//!         .from("alerts@example.com")
//!         .to("ops@example.com, oncall@example.com")
//!         .subject("Production errors")
//!         .single(true);
//!
//!     let mut appender = SmtpAppender::new(config, SimpleLayout);
//!     appender
//!         .append(&LoggingEvent::new(Level::Error, "billing", "card processor timed out"))
//!         .await
//!         .unwrap();
//!     appender.close().await.unwrap();
//! ```
//!
//! ## License
//!
//! Licensed under either of
//!
//!  * Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!  * MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//!
//! at your option.
//!

pub mod appender;
pub mod config;
pub mod hostname;
pub mod layout;
#[forbid(unsafe_code)]
pub mod smtp;

use std::fmt::Display;

pub use appender::{AppenderState, CloseReason, SmtpAppender};
pub use config::AppenderConfig;
pub use hostname::{FixedHostname, HostnameProvider, SystemHostname};
pub use layout::{Layout, Level, LoggingEvent, SimpleLayout};
use smtp::{client::Step, reply::Reply};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The TCP connection to the server could not be opened.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error on an open connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection or command timeout.
    #[error("Connection timeout")]
    Timeout,

    /// A connection is already open on this client.
    #[error("Already connected to a server")]
    AlreadyConnected,

    /// A protocol step was attempted without an open connection.
    #[error("Called {0} without being connected")]
    NotConnected(Step),

    /// The server answered a command with a reply outside the accepted set.
    #[error("{step} not accepted from server: {reply}")]
    Rejected { step: Step, reply: Reply },

    /// TLS handshake failure.
    #[error("Crypto not accepted from server: {0}")]
    Tls(rustls::Error),

    /// Invalid TLS name provided.
    #[error("Invalid TLS name provided")]
    InvalidTlsName,

    /// Recipients that were malformed or refused by the server.
    #[error("Bad recipients to send: {}", .0.join(", "))]
    BadRecipients(Vec<String>),

    /// A required configuration property is absent.
    #[error("Required parameter '{0}' not set")]
    MissingParameter(&'static str),

    /// A configuration property was given an unusable value.
    #[error("Invalid value '{value}' for parameter '{name}'")]
    InvalidParameter { name: &'static str, value: String },

    /// The client or sink was shut down or failed earlier.
    #[error("Connection closed")]
    Closed,
}

/// Failure classes reported by [`Error::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Protocol,
    Crypto,
    Recipient,
    Configuration,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connect { .. }
            | Error::Io(_)
            | Error::Timeout
            | Error::AlreadyConnected
            | Error::NotConnected(_)
            | Error::Closed => ErrorKind::Connection,
            Error::Rejected { .. } => ErrorKind::Protocol,
            Error::Tls(_) | Error::InvalidTlsName => ErrorKind::Crypto,
            Error::BadRecipients(_) => ErrorKind::Recipient,
            Error::MissingParameter(_) | Error::InvalidParameter { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorKind::Connection => "connection error",
            ErrorKind::Protocol => "protocol violation",
            ErrorKind::Crypto => "crypto upgrade failure",
            ErrorKind::Recipient => "recipient validation failure",
            ErrorKind::Configuration => "configuration error",
        })
    }
}
