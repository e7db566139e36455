use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{EventSource, KioskEvent};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub enum ButtonLayout {
    /// Dedicated scroll and mark buttons.
    TwoButton { scroll: PathBuf, mark: PathBuf },
    /// One button: a press shorter than `hold_to_mark` scrolls, a longer one
    /// commits a mark.
    SingleButton { pin: PathBuf, hold_to_mark: Duration },
}

#[derive(Debug, Clone)]
pub struct GpioButtonsConfig {
    pub layout: ButtonLayout,
    pub active_low: bool,
    pub poll_interval: Duration,
    pub debounce: Duration,
}

/// Tracks one pin across samples and reports completed presses. The press
/// length doubles as the debounce filter: spans shorter than `debounce` are
/// contact bounce and never become events.
#[derive(Debug, Clone)]
pub struct PressTracker {
    debounce: Duration,
    pressed_since: Option<Instant>,
    suppressed: bool,
}

impl PressTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            pressed_since: None,
            suppressed: false,
        }
    }

    /// Feeds one sample. Returns the held duration when a press ends.
    pub fn sample(&mut self, asserted: bool, now: Instant) -> Option<Duration> {
        if asserted {
            if !self.suppressed && self.pressed_since.is_none() {
                self.pressed_since = Some(now);
            }
            return None;
        }

        self.suppressed = false;
        let held = now.saturating_duration_since(self.pressed_since.take()?);
        if held < self.debounce {
            debug!(?held, "buttons: bounce ignored");
            return None;
        }
        Some(held)
    }

    /// Forgets a press in progress; the pin must be released before the next
    /// press can start. Returns whether a press was dropped.
    pub fn suppress(&mut self) -> bool {
        let dropped = self.pressed_since.take().is_some();
        self.suppressed = true;
        dropped
    }
}

struct Pin {
    path: PathBuf,
    tracker: PressTracker,
    read_failed: bool,
}

impl Pin {
    fn new(path: PathBuf, debounce: Duration) -> Self {
        Self {
            path,
            tracker: PressTracker::new(debounce),
            read_failed: false,
        }
    }

    async fn poll(&mut self, active_low: bool, now: Instant) -> Option<Duration> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => {
                if self.read_failed {
                    debug!(path = %self.path.display(), "buttons: pin readable again");
                    self.read_failed = false;
                }
                let high = raw.trim() == "1";
                self.tracker.sample(high != active_low, now)
            }
            Err(error) => {
                if !self.read_failed {
                    warn!(path = %self.path.display(), %error, "buttons: failed to read pin");
                    self.read_failed = true;
                }
                None
            }
        }
    }
}

enum Pins {
    Two { scroll: Pin, mark: Pin },
    Single { pin: Pin, hold_to_mark: Duration },
}

pub struct GpioButtons {
    pins: Pins,
    active_low: bool,
    poll_interval: Duration,
}

impl GpioButtons {
    pub fn new(config: GpioButtonsConfig) -> Self {
        let pins = match config.layout {
            ButtonLayout::TwoButton { scroll, mark } => Pins::Two {
                scroll: Pin::new(scroll, config.debounce),
                mark: Pin::new(mark, config.debounce),
            },
            ButtonLayout::SingleButton { pin, hold_to_mark } => Pins::Single {
                pin: Pin::new(pin, config.debounce),
                hold_to_mark,
            },
        };
        Self {
            pins,
            active_low: config.active_low,
            poll_interval: config.poll_interval,
        }
    }

    async fn poll_once(&mut self) -> Option<KioskEvent> {
        let now = Instant::now();
        match &mut self.pins {
            Pins::Two { scroll, mark } => {
                if scroll.poll(self.active_low, now).await.is_some() {
                    return Some(KioskEvent::Scroll);
                }
                mark.poll(self.active_low, now)
                    .await
                    .map(|held| KioskEvent::Mark { held })
            }
            Pins::Single { pin, hold_to_mark } => {
                let held = pin.poll(self.active_low, now).await?;
                Some(classify_single_press(held, *hold_to_mark))
            }
        }
    }
}

pub fn classify_single_press(held: Duration, hold_to_mark: Duration) -> KioskEvent {
    if held < hold_to_mark {
        KioskEvent::Scroll
    } else {
        KioskEvent::commit()
    }
}

#[async_trait]
impl EventSource for GpioButtons {
    async fn next_event(&mut self) -> Option<KioskEvent> {
        let mut ticker = tokio::time::interval(self.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Some(event) = self.poll_once().await {
                return Some(event);
            }
        }
    }

    fn discard_pending(&mut self) -> usize {
        match &mut self.pins {
            Pins::Two { scroll, mark } => {
                usize::from(scroll.tracker.suppress()) + usize::from(mark.tracker.suppress())
            }
            Pins::Single { pin, .. } => usize::from(pin.tracker.suppress()),
        }
    }
}

#[cfg(test)]
#[path = "tests/buttons_tests.rs"]
mod tests;
