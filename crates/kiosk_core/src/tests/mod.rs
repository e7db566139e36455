use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use async_trait::async_trait;
use hardware::{Display, DisplayLine, Indicator, IndicatorChannel};
use sheets_integration::{SheetConnector, SheetSession};
use shared::{
    domain::{CellAddress, ColumnRange, Roster, Student},
    error::RemoteFailure,
};
use tokio::sync::Mutex;

use crate::{
    connection::{ConnectionManager, RetryPolicy},
    controller::{Controller, ControllerConfig},
    feedback::{Feedback, FeedbackTiming},
    shutdown::ShutdownSignal,
    writer::CellWriter,
};

#[derive(Default)]
pub(crate) struct SheetLog {
    pub connects: u32,
    pub connect_failures: VecDeque<RemoteFailure>,
    pub hang_connects: bool,
    pub write_failures: VecDeque<RemoteFailure>,
    pub hang_writes: bool,
    pub read_failures: VecDeque<RemoteFailure>,
    pub writes: Vec<(String, String)>,
    pub reads: Vec<String>,
    pub cells: HashMap<String, String>,
    /// Returned for every multi-row read.
    pub index: Vec<Option<String>>,
    /// Overrides what single-cell reads return.
    pub stale_read_back: Option<String>,
}

impl SheetLog {
    pub fn with_index(values: &[&str]) -> Self {
        Self {
            index: values
                .iter()
                .map(|value| (!value.is_empty()).then(|| value.to_string()))
                .collect(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    pub log: Arc<Mutex<SheetLog>>,
}

impl FakeConnector {
    pub fn new(log: SheetLog) -> Self {
        Self {
            log: Arc::new(Mutex::new(log)),
        }
    }
}

#[async_trait]
impl SheetConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn SheetSession>, RemoteFailure> {
        let hang = {
            let mut log = self.log.lock().await;
            log.connects += 1;
            if let Some(failure) = log.connect_failures.pop_front() {
                return Err(failure);
            }
            log.hang_connects
        };
        if hang {
            std::future::pending::<()>().await;
        }
        Ok(Arc::new(FakeSession {
            log: Arc::clone(&self.log),
        }))
    }
}

struct FakeSession {
    log: Arc<Mutex<SheetLog>>,
}

#[async_trait]
impl SheetSession for FakeSession {
    async fn write_cell(&self, address: &CellAddress, value: &str) -> Result<(), RemoteFailure> {
        let hang = {
            let mut log = self.log.lock().await;
            if let Some(failure) = log.write_failures.pop_front() {
                return Err(failure);
            }
            log.hang_writes
        };
        if hang {
            std::future::pending::<()>().await;
        }
        let mut log = self.log.lock().await;
        log.writes.push((address.to_string(), value.to_string()));
        log.cells.insert(address.to_string(), value.to_string());
        Ok(())
    }

    async fn read_column(&self, range: &ColumnRange) -> Result<Vec<Option<String>>, RemoteFailure> {
        let mut log = self.log.lock().await;
        log.reads.push(range.to_string());
        if let Some(failure) = log.read_failures.pop_front() {
            return Err(failure);
        }
        if range.last_row == Some(range.first_row) {
            let stored = match &log.stale_read_back {
                Some(stale) => Some(stale.clone()),
                None => log.cells.get(&range.to_string()).cloned(),
            };
            return Ok(vec![stored]);
        }
        Ok(log.index.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DisplayCall {
    Show(DisplayLine, String),
    Clear,
}

#[derive(Clone, Default)]
pub(crate) struct RecordingDisplay {
    pub calls: Arc<StdMutex<Vec<DisplayCall>>>,
}

impl RecordingDisplay {
    pub fn calls(&self) -> Vec<DisplayCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

impl Display for RecordingDisplay {
    fn show(&mut self, text: &str, line: DisplayLine) -> io::Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(DisplayCall::Show(line, text.to_string()));
        }
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(DisplayCall::Clear);
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingIndicator {
    pub sets: Arc<StdMutex<Vec<(IndicatorChannel, bool)>>>,
}

impl RecordingIndicator {
    pub fn sets(&self) -> Vec<(IndicatorChannel, bool)> {
        self.sets.lock().map(|sets| sets.clone()).unwrap_or_default()
    }

    /// Number of times `channel` was switched on.
    pub fn pulses(&self, channel: IndicatorChannel) -> usize {
        self.sets()
            .iter()
            .filter(|(seen, on)| *seen == channel && *on)
            .count()
    }
}

impl Indicator for RecordingIndicator {
    fn set(&mut self, channel: IndicatorChannel, on: bool) -> io::Result<()> {
        if let Ok(mut sets) = self.sets.lock() {
            sets.push((channel, on));
        }
        Ok(())
    }
}

pub(crate) fn roster(entries: &[(&str, &str)]) -> Roster {
    let students = entries
        .iter()
        .map(|(name, column)| Student::new(*name, column).expect("student"))
        .collect();
    Roster::new(students).expect("roster")
}

pub(crate) fn two_students() -> Roster {
    roster(&[("A", "C"), ("B", "D")])
}

pub(crate) fn fast_retry(max_attempts: Option<u32>) -> RetryPolicy {
    RetryPolicy {
        initial_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
        multiplier: 2.0,
        max_attempts,
        attempt_timeout: Duration::from_millis(200),
    }
}

pub(crate) struct Harness {
    pub controller: Controller,
    pub connector: FakeConnector,
    pub display: RecordingDisplay,
    pub indicator: RecordingIndicator,
}

pub(crate) fn harness(
    roster: Roster,
    sheet: SheetLog,
    policy: RetryPolicy,
    shutdown: ShutdownSignal,
) -> Harness {
    let connector = FakeConnector::new(sheet);
    let display = RecordingDisplay::default();
    let indicator = RecordingIndicator::default();
    let connection = ConnectionManager::new(Arc::new(connector.clone()), policy, shutdown);
    let controller = Controller::new(
        roster,
        ControllerConfig::default(),
        connection,
        CellWriter::new(Duration::from_millis(200), false),
        Box::new(display.clone()),
        Feedback::new(Box::new(indicator.clone()), FeedbackTiming::instant()),
    );
    Harness {
        controller,
        connector,
        display,
        indicator,
    }
}
