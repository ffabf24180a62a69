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

use std::io;

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tokio_rustls::client::TlsStream;

use super::{
    message::encode_data,
    reply::{is_last_line, Reply},
};

/// Longest reply line read in one go, CRLF included.
pub const MAX_REPLY_LINE: usize = 514;

#[allow(clippy::large_enum_variant)]
#[doc(hidden)]
pub enum SmtpStream {
    Basic(BufReader<TcpStream>),
    Tls(Box<BufReader<TlsStream<TcpStream>>>),
    #[cfg(test)]
    Debug(Vec<u8>),
    None,
}

impl SmtpStream {
    pub(crate) fn is_connected(&self) -> bool {
        !matches!(self, SmtpStream::None)
    }

    pub(crate) fn is_secure(&self) -> bool {
        matches!(self, SmtpStream::Tls(_))
    }

    pub(crate) async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        match self {
            SmtpStream::Basic(stream) => stream.write_all(bytes).await,
            SmtpStream::Tls(stream) => stream.write_all(bytes).await,
            #[cfg(test)]
            SmtpStream::Debug(stream) => {
                stream.extend_from_slice(bytes);
                Ok(())
            }
            SmtpStream::None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    pub(crate) async fn flush(&mut self) -> io::Result<()> {
        match self {
            SmtpStream::Basic(stream) => stream.flush().await,
            SmtpStream::Tls(stream) => stream.flush().await,
            #[cfg(test)]
            SmtpStream::Debug(_) => Ok(()),
            SmtpStream::None => Err(io::ErrorKind::NotConnected.into()),
        }
    }

    /// Writes `line` followed by CRLF.
    pub(crate) async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(line.len() + 2);
        bytes.extend_from_slice(line.as_bytes());
        bytes.extend_from_slice(b"\r\n");
        self.write_all(&bytes).await?;
        self.flush().await
    }

    /// Reads lines until the final line of a reply and returns all of them.
    /// The reply is empty when the peer closed the connection first.
    pub(crate) async fn read_reply(&mut self) -> io::Result<Reply> {
        let mut data = Vec::with_capacity(128);

        loop {
            let start = data.len();
            let br = match self {
                SmtpStream::Basic(stream) => read_line(stream, &mut data).await?,
                SmtpStream::Tls(stream) => read_line(&mut **stream, &mut data).await?,
                #[cfg(test)]
                SmtpStream::Debug(_) => 0,
                SmtpStream::None => return Err(io::ErrorKind::NotConnected.into()),
            };

            if br == 0 || is_last_line(&data[start..]) {
                break;
            }
        }

        Ok(String::from_utf8_lossy(&data).into_owned().into())
    }

    /// Writes a rendered message in DATA mode: line endings are normalised,
    /// long lines folded, leading dots doubled and the end-of-data marker
    /// appended.
    pub(crate) async fn write_message(&mut self, message: &[u8]) -> io::Result<()> {
        let mut bytes = Vec::with_capacity(message.len() + 64);
        encode_data(message, &mut bytes);
        self.write_all(&bytes).await?;
        self.flush().await
    }

    pub(crate) async fn shutdown(&mut self) -> io::Result<()> {
        match std::mem::take(self) {
            SmtpStream::Basic(mut stream) => stream.shutdown().await,
            SmtpStream::Tls(mut stream) => stream.shutdown().await,
            #[cfg(test)]
            SmtpStream::Debug(_) => Ok(()),
            SmtpStream::None => Ok(()),
        }
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> io::Result<usize> {
    AsyncReadExt::take(reader, MAX_REPLY_LINE as u64)
        .read_until(b'\n', buf)
        .await
}

impl Default for SmtpStream {
    fn default() -> Self {
        SmtpStream::None
    }
}

#[cfg(test)]
mod test {
    use super::SmtpStream;

    #[tokio::test]
    async fn write_line() {
        let mut stream = SmtpStream::Debug(Vec::new());
        stream.write_line("EHLO client.example.com").await.unwrap();
        stream.write_line("").await.unwrap();
        if let SmtpStream::Debug(bytes) = stream {
            assert_eq!(bytes, b"EHLO client.example.com\r\n\r\n");
        }
    }

    #[tokio::test]
    async fn disconnected_stream() {
        let mut stream = SmtpStream::None;
        assert!(!stream.is_connected());
        assert_eq!(
            stream.write_line("NOOP").await.unwrap_err().kind(),
            std::io::ErrorKind::NotConnected
        );
        assert_eq!(
            stream.read_reply().await.unwrap_err().kind(),
            std::io::ErrorKind::NotConnected
        );
    }

    #[tokio::test]
    async fn transparency_procedure() {
        for (test, result) in [
            ("A: b\r\n.\r\n", "A: b\r\n..\r\n\r\n\r\n.\r\n"),
            ("A: b\r\n.", "A: b\r\n..\r\n\r\n.\r\n"),
            ("A: b\r\n..\r\n", "A: b\r\n...\r\n\r\n\r\n.\r\n"),
            ("A: ...b", "A: ...b\r\n\r\n.\r\n"),
            ("A: b\n\nhello", "A: b\r\n\r\nhello\r\n\r\n.\r\n"),
            ("A: b\r\rx\ry", "A: b\r\n\r\nx\r\ny\r\n\r\n.\r\n"),
        ] {
            let mut stream = SmtpStream::Debug(Vec::new());
            stream.write_message(test.as_bytes()).await.unwrap();
            if let SmtpStream::Debug(bytes) = stream {
                assert_eq!(String::from_utf8(bytes).unwrap(), result, "{test:?}");
            }
        }
    }
}
