use std::time::Duration;

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufRead, Lines},
    sync::mpsc,
};
use tracing::warn;

use crate::{EventSource, KioskEvent};

/// Parses one bench command: `s` scroll, `m` short mark, `l` long mark,
/// `m <ms>` mark held for an explicit number of milliseconds.
pub fn parse_bench_command(line: &str, long_hold: Duration) -> Option<KioskEvent> {
    let mut words = line.split_whitespace();
    let command = words.next()?.to_ascii_lowercase();
    let held = words.next();
    if words.next().is_some() {
        return None;
    }

    match (command.as_str(), held) {
        ("s" | "scroll", None) => Some(KioskEvent::Scroll),
        ("m" | "mark", None) => Some(KioskEvent::commit()),
        ("l" | "long", None) => Some(KioskEvent::Mark { held: long_hold }),
        ("m" | "mark", Some(ms)) => ms.parse::<u64>().ok().map(|ms| KioskEvent::Mark {
            held: Duration::from_millis(ms),
        }),
        _ => None,
    }
}

pub struct StdinEvents<R> {
    lines: Lines<R>,
    long_hold: Duration,
}

impl<R> StdinEvents<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// `long_hold` is the duration a bare `l` command reports.
    pub fn new(lines: Lines<R>, long_hold: Duration) -> Self {
        Self { lines, long_hold }
    }
}

#[async_trait]
impl<R> EventSource for StdinEvents<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Option<KioskEvent> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(error) => {
                    warn!(%error, "bench: failed to read stdin");
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_bench_command(&line, self.long_hold) {
                Some(event) => return Some(event),
                None => warn!(line = %line.trim(), "bench: unknown command (use s, m, l or m <ms>)"),
            }
        }
    }
}

pub struct ChannelEvents {
    rx: mpsc::Receiver<KioskEvent>,
}

impl ChannelEvents {
    pub fn new(rx: mpsc::Receiver<KioskEvent>) -> Self {
        Self { rx }
    }

    pub fn channel(capacity: usize) -> (mpsc::Sender<KioskEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl EventSource for ChannelEvents {
    async fn next_event(&mut self) -> Option<KioskEvent> {
        self.rx.recv().await
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

#[cfg(test)]
#[path = "tests/bench_tests.rs"]
mod tests;
