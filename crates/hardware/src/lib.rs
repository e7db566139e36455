use std::{io, time::Duration};

use async_trait::async_trait;
use tracing::warn;

pub mod bench;
pub mod buttons;
pub mod display;
pub mod led;
#[cfg(target_os = "linux")]
pub mod logger;

pub use bench::{ChannelEvents, StdinEvents};
pub use buttons::{ButtonLayout, GpioButtons, GpioButtonsConfig};
pub use display::{CharLcd, ConsoleDisplay};
pub use led::{LogIndicator, SysfsIndicator};
#[cfg(target_os = "linux")]
pub use logger::{LoggerConfig, LoggerEvents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskEvent {
    Scroll,
    Mark { held: Duration },
}

impl KioskEvent {
    pub fn commit() -> Self {
        Self::Mark {
            held: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayLine {
    First,
    Second,
}

impl DisplayLine {
    pub fn index(self) -> u8 {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorChannel {
    Ack,
    Fail,
}

pub trait Display: Send {
    fn show(&mut self, text: &str, line: DisplayLine) -> io::Result<()>;
    fn clear(&mut self) -> io::Result<()>;
}

pub trait Indicator: Send {
    fn set(&mut self, channel: IndicatorChannel, on: bool) -> io::Result<()>;
}

#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next button event. `None` once the source is exhausted.
    async fn next_event(&mut self) -> Option<KioskEvent>;

    /// Drops events observed since the last `next_event` returned and reports
    /// how many were dropped.
    fn discard_pending(&mut self) -> usize {
        0
    }
}

/// Best-effort return to a dark, blank kiosk. Failures are logged only.
pub fn hardware_reset(display: &mut dyn Display, indicator: &mut dyn Indicator) {
    for channel in [IndicatorChannel::Ack, IndicatorChannel::Fail] {
        if let Err(error) = indicator.set(channel, false) {
            warn!(?channel, %error, "hardware: failed to switch indicator off");
        }
    }
    if let Err(error) = display.clear() {
        warn!(%error, "hardware: failed to clear display");
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
