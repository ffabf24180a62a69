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

use std::borrow::Cow;

/// Characters allowed in a dot-atom of the local part, besides alphanumerics
/// (RFC 5322 section 3.2.3).
const ATEXT: &[u8] = b"!#$%&'*+/=?^_`{|}~-";

/// The three recipient lists of a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl Recipients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.to = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn cc(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cc = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn bcc(mut self, addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.bcc = addresses.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }

    /// Iterates over all addresses, To first, then Cc and Bcc.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
    }
}

impl<'x> From<&'x Recipients> for Cow<'x, Recipients> {
    fn from(recipients: &'x Recipients) -> Self {
        Cow::Borrowed(recipients)
    }
}

impl From<Recipients> for Cow<'_, Recipients> {
    fn from(recipients: Recipients) -> Self {
        Cow::Owned(recipients)
    }
}

/// Splits a comma separated address list. Whitespace is removed from lists
/// and empty entries are skipped; a single address is only trimmed.
pub fn parse_list(value: &str) -> Vec<String> {
    if value.contains(',') {
        value
            .split(',')
            .map(|address| {
                address
                    .chars()
                    .filter(|ch| !ch.is_whitespace())
                    .collect::<String>()
            })
            .filter(|address| !address.is_empty())
            .collect()
    } else {
        let address = value.trim();
        if address.is_empty() {
            Vec::new()
        } else {
            vec![address.to_string()]
        }
    }
}

/// Returns `true` if `address` has the `local@domain` shape: a dot-atom local
/// part and a domain of at least two alphanumeric labels, hyphens allowed
/// inside labels. Letters are matched case-insensitively.
pub fn is_valid(address: &str) -> bool {
    match address.rsplit_once('@') {
        Some((local, domain)) => local.split('.').all(is_atom) && is_domain(domain),
        None => false,
    }
}

fn is_atom(atom: &str) -> bool {
    !atom.is_empty()
        && atom
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || ATEXT.contains(&byte))
}

fn is_domain(domain: &str) -> bool {
    let mut labels = 0;
    for label in domain.split('.') {
        let bytes = label.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last))
                if first.is_ascii_alphanumeric()
                    && last.is_ascii_alphanumeric()
                    && bytes
                        .iter()
                        .all(|byte| byte.is_ascii_alphanumeric() || *byte == b'-') => {}
            _ => return false,
        }
        labels += 1;
    }
    labels >= 2
}
