use std::{fs, io, path::PathBuf};

use tracing::info;

use crate::{Indicator, IndicatorChannel};

#[derive(Debug, Clone)]
pub struct SysfsIndicator {
    green: PathBuf,
    red: PathBuf,
}

impl SysfsIndicator {
    /// Both paths point at exported GPIO `value` files, e.g.
    /// `/sys/class/gpio/gpio69/value`.
    pub fn new(green: impl Into<PathBuf>, red: impl Into<PathBuf>) -> Self {
        Self {
            green: green.into(),
            red: red.into(),
        }
    }

    fn path(&self, channel: IndicatorChannel) -> &PathBuf {
        match channel {
            IndicatorChannel::Ack => &self.green,
            IndicatorChannel::Fail => &self.red,
        }
    }
}

impl Indicator for SysfsIndicator {
    fn set(&mut self, channel: IndicatorChannel, on: bool) -> io::Result<()> {
        fs::write(self.path(channel), if on { "1\n" } else { "0\n" })
    }
}

#[derive(Debug, Default)]
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn set(&mut self, channel: IndicatorChannel, on: bool) -> io::Result<()> {
        info!(?channel, on, "led");
        Ok(())
    }
}
