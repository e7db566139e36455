pub mod connection;
pub mod controller;
pub mod cursor;
pub mod dispatcher;
pub mod feedback;
pub mod session_date;
pub mod settings;
pub mod shutdown;
pub mod writer;

pub use connection::{ConnectError, ConnectionManager, ConnectionState, RetryPolicy};
pub use controller::{
    Controller, ControllerConfig, ControllerState, EventOutcome, IgnoredReason, MarkAction,
};
pub use cursor::SelectionCursor;
pub use dispatcher::{BusyEventPolicy, DispatchExit, DispatchSummary, Dispatcher};
pub use feedback::{Feedback, FeedbackTiming};
pub use session_date::{load_session_row, resolve_session_row, today_string};
pub use settings::{load_settings, Settings, SettingsError};
pub use shutdown::{shutdown_channel, ShutdownSignal, ShutdownTrigger};
pub use writer::{CellWriter, ColumnValues, PendingWrite};

#[cfg(test)]
mod tests;
