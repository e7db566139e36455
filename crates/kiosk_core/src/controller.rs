use std::time::Duration;

use hardware::{hardware_reset, Display, DisplayLine, KioskEvent};
use shared::{
    domain::{CellAddress, ColumnRange, Roster, SessionRow},
    error::RemoteFailure,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    connection::{ConnectError, ConnectionManager},
    cursor::SelectionCursor,
    feedback::Feedback,
    writer::{CellWriter, ColumnValues, PendingWrite},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Marks held at least this long correct instead of commit.
    pub long_press_threshold: Duration,
    pub present_value: String,
    pub absent_value: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            long_press_threshold: Duration::from_secs(1),
            present_value: "1".into(),
            absent_value: "0".into(),
        }
    }
}

/// Session state mutated by event handling, owned by the dispatch loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerState {
    pub cursor: SelectionCursor,
    pub session_row: Option<SessionRow>,
}

impl ControllerState {
    pub fn new(session_row: Option<SessionRow>) -> Self {
        Self {
            cursor: SelectionCursor::new(),
            session_row,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkAction {
    Commit,
    Correct,
}

impl MarkAction {
    pub fn from_held(held: Duration, threshold: Duration) -> Self {
        if held < threshold {
            Self::Commit
        } else {
            Self::Correct
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoredReason {
    NoLessonToday,
    NothingSelected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Scrolled { index: usize },
    Committed(CellAddress),
    Corrected(CellAddress),
    Ignored(IgnoredReason),
    /// The write failed and the link was re-established (or given up on).
    /// The mark itself was not retried.
    WriteFailed {
        address: CellAddress,
        failure: RemoteFailure,
    },
    ConnectionUnavailable { address: CellAddress },
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

pub struct Controller {
    roster: Roster,
    config: ControllerConfig,
    connection: ConnectionManager,
    writer: CellWriter,
    display: Box<dyn Display>,
    feedback: Feedback,
}

impl Controller {
    pub fn new(
        roster: Roster,
        config: ControllerConfig,
        connection: ConnectionManager,
        writer: CellWriter,
        display: Box<dyn Display>,
        feedback: Feedback,
    ) -> Self {
        Self {
            roster,
            config,
            connection,
            writer,
            display,
            feedback,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn feedback_mut(&mut self) -> &mut Feedback {
        &mut self.feedback
    }

    pub async fn handle(&mut self, state: &mut ControllerState, event: KioskEvent) -> EventOutcome {
        match event {
            KioskEvent::Scroll => self.scroll(state),
            KioskEvent::Mark { held } => self.mark(state, held).await,
        }
    }

    fn scroll(&mut self, state: &mut ControllerState) -> EventOutcome {
        let index = state.cursor.advance(&self.roster);
        if let Some(student) = self.roster.get(index) {
            let name = student.display_name.clone();
            self.show(&name, DisplayLine::First);
            debug!(index, name = %name, "controller: scroll");
        }
        EventOutcome::Scrolled { index }
    }

    async fn mark(&mut self, state: &ControllerState, held: Duration) -> EventOutcome {
        let Some(row) = state.session_row else {
            debug!(?held, "controller: mark ignored, no lesson today");
            return EventOutcome::Ignored(IgnoredReason::NoLessonToday);
        };
        let Some(student) = state.cursor.selected().and_then(|index| self.roster.get(index))
        else {
            debug!(?held, "controller: mark ignored, nothing selected yet");
            return EventOutcome::Ignored(IgnoredReason::NothingSelected);
        };

        let action = MarkAction::from_held(held, self.config.long_press_threshold);
        let address = CellAddress::for_student(student, row);
        let value = match action {
            MarkAction::Commit => self.config.present_value.clone(),
            MarkAction::Correct => self.config.absent_value.clone(),
        };
        let write = PendingWrite { address, value };
        info!(
            address = %write.address,
            student = %student.display_name,
            ?action,
            ?held,
            "controller: mark"
        );

        let session = match self.connection.ensure_connected(&mut self.feedback).await {
            Ok(session) => session,
            Err(ConnectError::Cancelled) => return EventOutcome::Cancelled,
            Err(error) => {
                warn!(address = %write.address, %error, "controller: mark dropped, no connection");
                return EventOutcome::ConnectionUnavailable {
                    address: write.address,
                };
            }
        };

        match self.writer.write_mark(session.as_ref(), &write).await {
            Ok(()) => {
                self.feedback.ack().await;
                match action {
                    MarkAction::Commit => EventOutcome::Committed(write.address),
                    MarkAction::Correct => EventOutcome::Corrected(write.address),
                }
            }
            Err(failure) => {
                warn!(
                    address = %write.address,
                    kind = ?failure.kind,
                    %failure,
                    "controller: mark failed; reconnecting"
                );
                self.connection.mark_disconnected();
                match self.connection.ensure_connected(&mut self.feedback).await {
                    Ok(_) => info!("controller: reconnected; mark must be repeated"),
                    Err(ConnectError::Cancelled) => return EventOutcome::Cancelled,
                    Err(error) => warn!(%error, "controller: reconnect gave up"),
                }
                self.feedback.fail().await;
                EventOutcome::WriteFailed {
                    address: write.address,
                    failure,
                }
            }
        }
    }

    /// Connects if needed and reads `range`. A failed read marks the link lost.
    pub async fn fetch_index(&mut self, range: &ColumnRange) -> Result<ColumnValues, FetchError> {
        let session = self.connection.ensure_connected(&mut self.feedback).await?;
        match self.writer.read_index(session.as_ref(), range).await {
            Ok(index) => Ok(index),
            Err(failure) => {
                self.connection.mark_disconnected();
                Err(failure.into())
            }
        }
    }

    pub fn show(&mut self, text: &str, line: DisplayLine) {
        if let Err(error) = self.display.show(text, line) {
            warn!(%error, ?line, "controller: display write failed");
        }
    }

    pub fn reset_hardware(&mut self) {
        hardware_reset(self.display.as_mut(), self.feedback.indicator_mut());
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
