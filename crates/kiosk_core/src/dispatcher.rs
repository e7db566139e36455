use hardware::EventSource;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    controller::{Controller, ControllerState, EventOutcome},
    shutdown::ShutdownSignal,
};

/// What happens to button events that arrive while an event is being handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyEventPolicy {
    #[default]
    Drop,
    Queue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchExit {
    Shutdown,
    SourceClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub handled: usize,
    pub dropped: usize,
    pub exit: DispatchExit,
}

pub struct Dispatcher<S> {
    source: S,
    policy: BusyEventPolicy,
    shutdown: ShutdownSignal,
}

impl<S: EventSource> Dispatcher<S> {
    pub fn new(source: S, policy: BusyEventPolicy, shutdown: ShutdownSignal) -> Self {
        Self {
            source,
            policy,
            shutdown,
        }
    }

    pub fn into_source(self) -> S {
        self.source
    }

    pub async fn run(
        &mut self,
        controller: &mut Controller,
        state: &mut ControllerState,
    ) -> DispatchSummary {
        let mut shutdown = self.shutdown.clone();
        let mut handled = 0;
        let mut dropped = 0;

        let exit = loop {
            if shutdown.is_triggered() {
                break DispatchExit::Shutdown;
            }

            let next = tokio::select! {
                event = self.source.next_event() => Some(event),
                _ = shutdown.triggered() => None,
            };
            let Some(next) = next else {
                break DispatchExit::Shutdown;
            };
            let Some(event) = next else {
                break DispatchExit::SourceClosed;
            };

            let outcome = controller.handle(state, event).await;
            handled += 1;
            debug!(?event, ?outcome, "dispatch: event handled");
            if outcome == EventOutcome::Cancelled {
                break DispatchExit::Shutdown;
            }

            if self.policy == BusyEventPolicy::Drop {
                let discarded = self.source.discard_pending();
                if discarded > 0 {
                    info!(discarded, "dispatch: dropped events received while busy");
                    dropped += discarded;
                }
            }
        };

        info!(handled, dropped, ?exit, "dispatch: loop stopped");
        DispatchSummary {
            handled,
            dropped,
            exit,
        }
    }
}

#[cfg(test)]
#[path = "tests/dispatcher_tests.rs"]
mod tests;
