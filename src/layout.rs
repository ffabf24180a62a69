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

use std::{borrow::Cow, fmt::Display};

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// A log record handed to the appender.
#[derive(Debug, Clone)]
pub struct LoggingEvent<'x> {
    pub level: Level,
    pub logger: Cow<'x, str>,
    pub message: Cow<'x, str>,
    pub timestamp: DateTime<Local>,
}

/// Renders events to text and frames the message body.
pub trait Layout {
    fn format(&self, event: &LoggingEvent<'_>) -> String;

    /// Text placed before the accumulated events.
    fn header(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    /// Text placed after the accumulated events.
    fn footer(&self) -> Cow<'_, str> {
        Cow::Borrowed("")
    }

    fn content_type(&self) -> Cow<'_, str> {
        Cow::Borrowed("text/plain")
    }
}

/// Renders `LEVEL - message` followed by a newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleLayout;

impl<'x> LoggingEvent<'x> {
    /// Create a new event timestamped now.
    pub fn new(
        level: Level,
        logger: impl Into<Cow<'x, str>>,
        message: impl Into<Cow<'x, str>>,
    ) -> Self {
        LoggingEvent {
            level,
            logger: logger.into(),
            message: message.into(),
            timestamp: Local::now(),
        }
    }
}

impl Layout for SimpleLayout {
    fn format(&self, event: &LoggingEvent<'_>) -> String {
        format!("{} - {}\n", event.level, event.message)
    }
}

impl<T: Layout + ?Sized> Layout for Box<T> {
    fn format(&self, event: &LoggingEvent<'_>) -> String {
        (**self).format(event)
    }

    fn header(&self) -> Cow<'_, str> {
        (**self).header()
    }

    fn footer(&self) -> Cow<'_, str> {
        (**self).footer()
    }

    fn content_type(&self) -> Cow<'_, str> {
        (**self).content_type()
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        })
    }
}
