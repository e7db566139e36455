use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use inotify::{Event, EventMask, EventStream, Inotify, WatchDescriptor, WatchMask};
use tracing::{debug, warn};

use crate::{EventSource, KioskEvent};

pub const DEFAULT_SCROLL_DIR: &str = "/sys/logger/gpio44";
pub const DEFAULT_MARK_DIR: &str = "/sys/logger/gpio68";

const ACTIVATE: &str = "activate";
const PRESS_TIME: &str = "pressTime";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub scroll_dir: PathBuf,
    pub mark_dir: PathBuf,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            scroll_dir: PathBuf::from(DEFAULT_SCROLL_DIR),
            mark_dir: PathBuf::from(DEFAULT_MARK_DIR),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerButton {
    Scroll,
    Mark,
}

/// `pressTime` as written by the module: decimal seconds and a newline.
pub fn parse_press_time(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

pub async fn read_press_time(dir: &Path) -> io::Result<Duration> {
    let path = dir.join(PRESS_TIME);
    let raw = tokio::fs::read_to_string(&path).await?;
    parse_press_time(&raw).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unexpected pressTime {:?} in {}", raw.trim(), path.display()),
        )
    })
}

/// Buttons reported by the attendance logger kernel module. Each press closes
/// the button directory's `activate` attribute after reading it; `pressTime`
/// holds the length of the last press in whole seconds.
pub struct LoggerEvents {
    events: EventStream<[u8; 1024]>,
    scroll: WatchDescriptor,
    mark: WatchDescriptor,
    mark_dir: PathBuf,
}

impl LoggerEvents {
    pub fn new(config: LoggerConfig) -> io::Result<Self> {
        let inotify = Inotify::init()?;
        let mut watches = inotify.watches();
        let scroll = watches.add(config.scroll_dir.join(ACTIVATE), WatchMask::CLOSE_NOWRITE)?;
        let mark = watches.add(config.mark_dir.join(ACTIVATE), WatchMask::CLOSE_NOWRITE)?;
        debug!(
            scroll = %config.scroll_dir.display(),
            mark = %config.mark_dir.display(),
            "logger: watching activate attributes"
        );
        Ok(Self {
            events: inotify.into_event_stream([0; 1024])?,
            scroll,
            mark,
            mark_dir: config.mark_dir,
        })
    }

    pub fn classify(&self, event: &Event<OsString>) -> Option<LoggerButton> {
        if !event.mask.contains(EventMask::CLOSE_NOWRITE) {
            return None;
        }
        if event.wd == self.scroll {
            Some(LoggerButton::Scroll)
        } else if event.wd == self.mark {
            Some(LoggerButton::Mark)
        } else {
            None
        }
    }
}

#[async_trait]
impl EventSource for LoggerEvents {
    async fn next_event(&mut self) -> Option<KioskEvent> {
        loop {
            let event = match self.events.next().await? {
                Ok(event) => event,
                Err(error) => {
                    warn!(%error, "logger: inotify stream failed");
                    return None;
                }
            };
            match self.classify(&event) {
                Some(LoggerButton::Scroll) => return Some(KioskEvent::Scroll),
                Some(LoggerButton::Mark) => match read_press_time(&self.mark_dir).await {
                    Ok(held) => return Some(KioskEvent::Mark { held }),
                    Err(error) => warn!(%error, "logger: mark press without a readable pressTime"),
                },
                None => debug!(mask = ?event.mask, "logger: unrelated notification ignored"),
            }
        }
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while let Some(Some(Ok(event))) = self.events.next().now_or_never() {
            if self.classify(&event).is_some() {
                dropped += 1;
            }
        }
        dropped
    }
}

#[cfg(test)]
#[path = "tests/logger_tests.rs"]
mod tests;
