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

use std::{borrow::Cow, fmt::Write};

use chrono::{DateTime, FixedOffset, Local};
use encoding_rs::{EncoderResult, Encoding, UTF_8, WINDOWS_1252};

use super::address::Recipients;

/// Longest line allowed on the wire, CRLF excluded (RFC 5322 section 2.1.1).
pub const MAX_LINE_LENGTH: usize = 998;

/// Longest encoded-word allowed in a header (RFC 2047 section 2).
const MAX_ENCODED_WORD: usize = 75;

/// Labels that name windows-1252 itself.
const WINDOWS_1252_LABELS: [&str; 3] = ["windows-1252", "cp1252", "x-cp1252"];

pub const MIME_VERSION: &str = "1.0";
pub const CONTENT_TRANSFER_ENCODING: &str = "8BIT";

/// A complete message: envelope headers plus the layout-framed body.
#[derive(Debug, Clone)]
pub struct Message<'x> {
    pub message_id: Cow<'x, str>,
    pub date: DateTime<FixedOffset>,
    pub subject: Cow<'x, str>,
    pub from: Cow<'x, str>,
    pub recipients: Cow<'x, Recipients>,
    pub content_type: Cow<'x, str>,
    pub charset: Cow<'x, str>,
    pub header: Cow<'x, str>,
    pub body: Cow<'x, str>,
    pub footer: Cow<'x, str>,
}

impl<'x> Message<'x> {
    /// Create a new message dated now.
    pub fn new(
        from: impl Into<Cow<'x, str>>,
        recipients: impl Into<Cow<'x, Recipients>>,
    ) -> Self {
        Message {
            message_id: Cow::Borrowed(""),
            date: Local::now().into(),
            subject: Cow::Borrowed(""),
            from: from.into(),
            recipients: recipients.into(),
            content_type: Cow::Borrowed("text/plain"),
            charset: Cow::Borrowed("UTF-8"),
            header: Cow::Borrowed(""),
            body: Cow::Borrowed(""),
            footer: Cow::Borrowed(""),
        }
    }

    pub fn message_id(mut self, message_id: impl Into<Cow<'x, str>>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn date(mut self, date: impl Into<DateTime<FixedOffset>>) -> Self {
        self.date = date.into();
        self
    }

    pub fn subject(mut self, subject: impl Into<Cow<'x, str>>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the MIME type of the body, without charset.
    pub fn content_type(mut self, content_type: impl Into<Cow<'x, str>>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<Cow<'x, str>>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Sets the text placed before the body.
    pub fn header(mut self, header: impl Into<Cow<'x, str>>) -> Self {
        self.header = header.into();
        self
    }

    pub fn body(mut self, body: impl Into<Cow<'x, str>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the text placed after the body.
    pub fn footer(mut self, footer: impl Into<Cow<'x, str>>) -> Self {
        self.footer = footer.into();
        self
    }

    /// Renders headers and body, converted to the message charset. The
    /// end-of-data marker is not included.
    pub fn render(&self) -> Vec<u8> {
        let charset = Charset::for_label(&self.charset);
        let mut text = String::with_capacity(
            512 + self.header.len() + self.body.len() + self.footer.len(),
        );

        header_line(&mut text, "Message-ID", &self.message_id);
        header_line(&mut text, "Date", &self.date.to_rfc2822());
        header_line(
            &mut text,
            "Subject",
            &encode_subject(&self.subject, charset),
        );
        header_line(&mut text, "From", &self.from);
        address_line(&mut text, "To", &self.recipients.to);
        address_line(&mut text, "Cc", &self.recipients.cc);
        address_line(&mut text, "Bcc", &self.recipients.bcc);
        header_line(&mut text, "MIME-Version", MIME_VERSION);
        header_line(
            &mut text,
            "Content-Type",
            &format!("{}; charset={}", self.content_type, charset.name()),
        );
        header_line(
            &mut text,
            "Content-Transfer-Encoding",
            CONTENT_TRANSFER_ENCODING,
        );
        text.push_str("\r\n");

        text.push_str(&self.header);
        text.push_str(&self.body);
        text.push_str(&self.footer);

        charset.encode(&text)
    }
}

fn header_line(text: &mut String, name: &str, value: &str) {
    text.push_str(name);
    text.push_str(": ");
    text.push_str(value);
    text.push_str("\r\n");
}

fn address_line(text: &mut String, name: &str, addresses: &[String]) {
    if !addresses.is_empty() {
        header_line(text, name, &format!("<{}>", addresses.join(">,<")));
    }
}

/// Target charset of a rendered message.
///
/// Labels that encoding_rs folds into windows-1252 (`ISO-8859-1`, `latin1`,
/// ...) are encoded as strict Latin-1, so bytes 0x80-0x9F never appear under
/// a declared ISO-8859-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Latin1,
    Encoding(&'static Encoding),
}

impl Charset {
    /// Looks up a charset by its label, falling back to UTF-8.
    pub fn for_label(label: &str) -> Self {
        let label = label.trim();
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding)
                if encoding == WINDOWS_1252
                    && !WINDOWS_1252_LABELS
                        .iter()
                        .any(|name| name.eq_ignore_ascii_case(label)) =>
            {
                Charset::Latin1
            }
            Some(encoding) => Charset::Encoding(encoding),
            None => {
                tracing::warn!(charset = label, "Unknown charset, using UTF-8");
                Charset::Encoding(UTF_8)
            }
        }
    }

    /// Name declared in Content-Type and encoded-words.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Encoding(encoding) => encoding.name(),
        }
    }

    /// Converts `text` to this charset. Characters it cannot represent
    /// become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Latin1 => text
                .chars()
                .map(|ch| u8::try_from(ch).unwrap_or(b'?'))
                .collect(),
            Charset::Encoding(encoding) => {
                let mut encoder = encoding.new_encoder();
                let mut bytes = Vec::with_capacity(text.len() + 16);
                let mut input = text;
                loop {
                    let (result, read) = encoder
                        .encode_from_utf8_to_vec_without_replacement(input, &mut bytes, true);
                    input = &input[read..];
                    match result {
                        EncoderResult::InputEmpty => break,
                        EncoderResult::OutputFull => bytes.reserve(input.len() + 16),
                        EncoderResult::Unmappable(_) => bytes.push(b'?'),
                    }
                }
                bytes
            }
        }
    }
}

/// Encodes a subject as RFC 2047 "Q" encoded-words in `charset`. Plain
/// printable ASCII is returned unchanged.
pub fn encode_subject(subject: &str, charset: Charset) -> String {
    if subject.bytes().all(|byte| (b' '..=b'~').contains(&byte)) && !subject.contains("=?") {
        return subject.to_string();
    }

    let prefix = format!("=?{}?Q?", charset.name());
    let max_payload = MAX_ENCODED_WORD
        .saturating_sub(prefix.len() + 2)
        .max(12);
    let mut words = Vec::new();
    let mut word = String::new();
    let mut buf = [0u8; 4];

    // Characters are kept whole within an encoded-word.
    for ch in subject.chars() {
        let bytes = charset.encode(ch.encode_utf8(&mut buf));
        let mut encoded = String::with_capacity(bytes.len() * 3);
        for &byte in bytes.iter() {
            match byte {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                    encoded.push(byte as char)
                }
                b' ' => encoded.push('_'),
                _ => {
                    let _ = write!(encoded, "={byte:02X}");
                }
            }
        }

        if !word.is_empty() && word.len() + encoded.len() > max_payload {
            words.push(std::mem::take(&mut word));
        }
        word.push_str(&encoded);
    }
    if !word.is_empty() {
        words.push(word);
    }

    words
        .iter()
        .map(|word| format!("{prefix}{word}?="))
        .collect::<Vec<_>>()
        .join("\r\n ")
}

/// Prepares a rendered message for DATA mode and appends it to `out`.
///
/// Line endings are normalised to CRLF. Lines longer than
/// [`MAX_LINE_LENGTH`] are folded at the last space before the limit, or cut
/// at the limit when there is none; folded header lines continue with a tab.
/// Lines starting with a dot get a second one. The blank line and lone dot
/// ending the data are appended last.
pub fn encode_data(message: &[u8], out: &mut Vec<u8>) {
    let message = normalize_line_endings(message);
    let mut lines = message.split(|byte| *byte == b'\n').peekable();
    let mut in_headers = lines.peek().map_or(false, |line| starts_with_header(line));

    for line in lines {
        if line.is_empty() {
            in_headers = false;
        }
        fold_line(line, in_headers, out);
    }

    out.extend_from_slice(b"\r\n.\r\n");
}

fn normalize_line_endings(message: &[u8]) -> Cow<'_, [u8]> {
    if !message.contains(&b'\r') {
        return Cow::Borrowed(message);
    }

    let mut normalized = Vec::with_capacity(message.len());
    let mut iter = message.iter().peekable();
    while let Some(byte) = iter.next() {
        if *byte == b'\r' {
            if iter.peek() == Some(&&b'\n') {
                iter.next();
            }
            normalized.push(b'\n');
        } else {
            normalized.push(*byte);
        }
    }
    Cow::Owned(normalized)
}

/// The message starts with headers when its first line reads `Name: ...`
/// and the name has no spaces.
fn starts_with_header(line: &[u8]) -> bool {
    line.iter()
        .position(|byte| *byte == b':')
        .map_or(false, |pos| pos > 0 && !line[..pos].contains(&b' '))
}

fn fold_line(mut line: &[u8], is_header: bool, out: &mut Vec<u8>) {
    let mut is_continuation = false;

    loop {
        let prefix = usize::from(is_header && is_continuation);
        let limit = MAX_LINE_LENGTH - prefix;
        let (head, rest) = if line.len() > limit {
            match line[..limit].iter().rposition(|byte| *byte == b' ') {
                Some(pos) if pos > 0 => (&line[..pos], Some(&line[pos + 1..])),
                _ => (&line[..limit], Some(&line[limit..])),
            }
        } else {
            (line, None)
        };

        if prefix > 0 {
            out.push(b'\t');
        } else if head.first() == Some(&b'.') {
            out.push(b'.');
        }
        out.extend_from_slice(head);
        out.extend_from_slice(b"\r\n");

        match rest {
            Some(rest) => {
                line = rest;
                is_continuation = true;
            }
            None => break,
        }
    }
}
