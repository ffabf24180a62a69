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

//! Scripted SMTP server for tests.
//!
//! The first reply is sent as the banner, each further reply answers one
//! command. After a `354` reply the server reads the whole message up to the
//! lone `.` line before answering. Once the script is exhausted the server
//! keeps reading until the client hangs up.

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};

pub(crate) struct MockServer {
    pub port: u16,
    handle: JoinHandle<Vec<Vec<String>>>,
}

impl MockServer {
    /// Serves `sessions` consecutive connections with the same script.
    pub async fn start(replies: &[&str], sessions: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let replies = replies
            .iter()
            .map(|reply| reply.to_string())
            .collect::<Vec<_>>();

        let handle = tokio::spawn(async move {
            let mut transcripts = Vec::with_capacity(sessions);
            for _ in 0..sessions {
                let (stream, _) = listener.accept().await.unwrap();
                transcripts.push(session(stream, &replies).await);
            }
            transcripts
        });

        MockServer { port, handle }
    }

    /// Waits for all sessions to end and returns the lines each one received.
    pub async fn transcripts(self) -> Vec<Vec<String>> {
        self.handle.await.unwrap()
    }
}

async fn session(stream: TcpStream, replies: &[String]) -> Vec<String> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut transcript = Vec::new();
    let mut replies = replies.iter();
    let mut in_data = false;

    if let Some(banner) = replies.next() {
        if writer
            .write_all(format!("{banner}\r\n").as_bytes())
            .await
            .is_err()
        {
            return transcript;
        }
    }

    for reply in replies {
        loop {
            let line = match read_line(&mut reader).await {
                Some(line) => line,
                None => return transcript,
            };
            let done = !in_data || line == ".";
            transcript.push(line);
            if done {
                break;
            }
        }

        in_data = reply.starts_with("354");
        if writer
            .write_all(format!("{reply}\r\n").as_bytes())
            .await
            .is_err()
        {
            return transcript;
        }
    }

    while let Some(line) = read_line(&mut reader).await {
        transcript.push(line);
    }

    transcript
}

async fn read_line(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> Option<String> {
    let mut line = Vec::new();
    match reader.read_until(b'\n', &mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(
            String::from_utf8_lossy(&line)
                .trim_end_matches(&['\r', '\n'][..])
                .to_string(),
        ),
    }
}
