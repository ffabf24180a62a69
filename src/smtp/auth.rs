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

use std::fmt::Debug;

use base64::{engine::general_purpose::STANDARD, Engine};

/// AUTH LOGIN credentials.
///
/// Both values are base64-encoded when assigned, which is the form in which
/// they travel on the wire. This is a transport encoding, not protection.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    /// Creates a new `Credentials` instance from plain text values.
    pub fn new(username: impl AsRef<[u8]>, secret: impl AsRef<[u8]>) -> Self {
        Credentials {
            username: encode(username),
            secret: encode(secret),
        }
    }

    /// Creates a new `Credentials` instance from already encoded values.
    pub fn from_encoded(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn encoded_username(&self) -> &str {
        &self.username
    }

    pub fn encoded_secret(&self) -> &str {
        &self.secret
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Base64-encodes a value the way AUTH LOGIN expects it.
pub fn encode(value: impl AsRef<[u8]>) -> String {
    STANDARD.encode(value)
}
