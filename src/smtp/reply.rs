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

use std::fmt::Display;

/// Reply codes accepted as success at every protocol step: QUIT ack,
/// AUTH success, OK, forwarded recipient, AUTH continue and DATA start.
///
/// 334 is accepted even outside of AUTH. The set is deliberately coarse and
/// does not tell transient (4xx) from permanent (5xx) failures.
pub const SUCCESS_CODES: [u16; 6] = [221, 235, 250, 251, 334, 354];

/// Ready code expected in reply to STARTTLS. Not part of [`SUCCESS_CODES`].
pub const START_TLS_READY: u16 = 220;

/// Reply code expected in reply to DATA.
pub const START_DATA: u16 = 354;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    PositiveCompletion = 2,
    PositiveIntermediate = 3,
    TransientNegativeCompletion = 4,
    PermanentNegativeCompletion = 5,
    Invalid = 0,
}

/// Raw text of a complete, possibly multi-line, SMTP reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    text: String,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Reply { text: text.into() }
    }

    /// Returns the status code taken from the first three characters of the
    /// reply, or `None` for an empty or malformed reply.
    pub fn code(&self) -> Option<u16> {
        let code = self.text.get(0..3)?;
        if code.bytes().all(|byte| byte.is_ascii_digit()) {
            code.parse().ok()
        } else {
            None
        }
    }

    pub fn is_success(&self) -> bool {
        self.code()
            .map_or(false, |code| SUCCESS_CODES.contains(&code))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the reply lines without their code and separator.
    pub fn message(&self) -> Vec<&str> {
        self.text
            .lines()
            .map(|line| line.get(4..).unwrap_or_default().trim_end())
            .collect()
    }

    pub fn severity(&self) -> Severity {
        match self.code().map(|code| code / 100) {
            Some(2) => Severity::PositiveCompletion,
            Some(3) => Severity::PositiveIntermediate,
            Some(4) => Severity::TransientNegativeCompletion,
            Some(5) => Severity::PermanentNegativeCompletion,
            _ => Severity::Invalid,
        }
    }
}

/// Returns `true` when `line` is the final line of a reply, i.e. its fourth
/// character is a space.
pub fn is_last_line(line: &[u8]) -> bool {
    line.get(3) == Some(&b' ')
}

impl Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.text.is_empty() {
            return f.write_str("<empty reply>");
        }
        for (pos, line) in self.text.lines().enumerate() {
            if pos > 0 {
                f.write_str(" | ")?;
            }
            f.write_str(line.trim_end())?;
        }
        Ok(())
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply { text }
    }
}

#[cfg(test)]
mod test {
    use super::{is_last_line, Reply, Severity, SUCCESS_CODES};

    #[test]
    fn success_codes() {
        for code in SUCCESS_CODES {
            let reply = Reply::new(format!("{code} Fine\r\n"));
            assert_eq!(reply.code(), Some(code));
            assert!(reply.is_success(), "{code} should be accepted");
        }

        for reply in [
            "500 unknown command\r\n",
            "421 Service not available\r\n",
            "535 Authentication credentials invalid\r\n",
            "220 Ready to start TLS\r\n",
            "552 Requested action aborted\r\n",
            "",
            "25",
            "abc def\r\n",
        ] {
            assert!(!Reply::new(reply).is_success(), "{reply:?} should fail");
        }

        assert_eq!(Reply::new("").code(), None);
        assert_eq!(Reply::new("2x0 odd\r\n").code(), None);
    }

    #[test]
    fn multi_line_reply() {
        let reply = Reply::new(concat!(
            "250-smtp.example.com Hello client.example.com\r\n",
            "250-AUTH LOGIN PLAIN\r\n",
            "250 STARTTLS\r\n",
        ));
        assert_eq!(reply.code(), Some(250));
        assert!(reply.is_success());
        assert_eq!(reply.severity(), Severity::PositiveCompletion);
        assert_eq!(
            reply.message(),
            vec![
                "smtp.example.com Hello client.example.com",
                "AUTH LOGIN PLAIN",
                "STARTTLS"
            ]
        );
        assert_eq!(
            reply.to_string(),
            "250-smtp.example.com Hello client.example.com | 250-AUTH LOGIN PLAIN | 250 STARTTLS"
        );

        let reply = Reply::new("421 These pretzels are making me thirsty\r\n");
        assert_eq!(reply.severity(), Severity::TransientNegativeCompletion);
        assert_eq!(Reply::new("").to_string(), "<empty reply>");
    }

    #[test]
    fn last_line() {
        assert!(is_last_line(b"250 OK\r\n"));
        assert!(!is_last_line(b"250-First line\r\n"));
        assert!(!is_last_line(b"250"));
        assert!(!is_last_line(b""));
    }
}
