use std::time::Duration;

use hardware::{Indicator, IndicatorChannel};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTiming {
    pub ack_pulse: Duration,
    pub ack_pulses: u32,
    pub fail_hold: Duration,
}

impl Default for FeedbackTiming {
    fn default() -> Self {
        Self {
            ack_pulse: Duration::from_millis(200),
            ack_pulses: 2,
            fail_hold: Duration::from_secs(1),
        }
    }
}

impl FeedbackTiming {
    pub fn instant() -> Self {
        Self {
            ack_pulse: Duration::ZERO,
            ack_pulses: 2,
            fail_hold: Duration::ZERO,
        }
    }
}

pub struct Feedback {
    indicator: Box<dyn Indicator>,
    timing: FeedbackTiming,
}

impl Feedback {
    pub fn new(indicator: Box<dyn Indicator>, timing: FeedbackTiming) -> Self {
        Self { indicator, timing }
    }

    /// Green blinks: on, off, on, off with `ack_pulse` between each step.
    pub async fn ack(&mut self) {
        for pulse in 0..self.timing.ack_pulses {
            self.set(IndicatorChannel::Ack, true);
            pause(self.timing.ack_pulse).await;
            self.set(IndicatorChannel::Ack, false);
            if pulse + 1 < self.timing.ack_pulses {
                pause(self.timing.ack_pulse).await;
            }
        }
    }

    /// Red held for `fail_hold`.
    pub async fn fail(&mut self) {
        self.set(IndicatorChannel::Fail, true);
        pause(self.timing.fail_hold).await;
        self.set(IndicatorChannel::Fail, false);
    }

    pub fn indicator_mut(&mut self) -> &mut dyn Indicator {
        self.indicator.as_mut()
    }

    fn set(&mut self, channel: IndicatorChannel, on: bool) {
        if let Err(error) = self.indicator.set(channel, on) {
            warn!(?channel, on, %error, "feedback: indicator write failed");
        }
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
#[path = "tests/feedback_tests.rs"]
mod tests;
