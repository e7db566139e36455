use std::{future::Future, time::Duration};

use sheets_integration::SheetSession;
use shared::{
    domain::{CellAddress, ColumnRange, SessionRow},
    error::RemoteFailure,
};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub address: CellAddress,
    pub value: String,
}

/// One read of a single-column range, aligned with sheet row numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnValues {
    first_row: u32,
    values: Vec<Option<String>>,
}

impl ColumnValues {
    pub fn new(first_row: u32, values: Vec<Option<String>>) -> Self {
        Self { first_row, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SessionRow, Option<&str>)> + '_ {
        self.values
            .iter()
            .zip(self.first_row..)
            .map(|(value, row)| (SessionRow(row), value.as_deref()))
    }
}

#[derive(Debug, Clone)]
pub struct CellWriter {
    timeout: Duration,
    verify_writes: bool,
}

impl CellWriter {
    pub fn new(timeout: Duration, verify_writes: bool) -> Self {
        Self {
            timeout,
            verify_writes,
        }
    }

    pub async fn write_mark(
        &self,
        session: &dyn SheetSession,
        write: &PendingWrite,
    ) -> Result<(), RemoteFailure> {
        debug!(address = %write.address, value = %write.value, "writer: updating cell");
        self.bounded(
            format!("write to {}", write.address),
            session.write_cell(&write.address, &write.value),
        )
        .await?;

        if self.verify_writes {
            let range = ColumnRange::single(&write.address);
            let stored = self
                .bounded(
                    format!("read-back of {}", write.address),
                    session.read_column(&range),
                )
                .await?;
            let stored = stored.into_iter().next().flatten();
            if stored.as_deref() != Some(write.value.as_str()) {
                return Err(RemoteFailure::rejected(format!(
                    "read-back of {} returned {stored:?}, expected {:?}",
                    write.address, write.value
                )));
            }
        }

        info!(address = %write.address, value = %write.value, "writer: cell updated");
        Ok(())
    }

    pub async fn read_index(
        &self,
        session: &dyn SheetSession,
        range: &ColumnRange,
    ) -> Result<ColumnValues, RemoteFailure> {
        let values = self
            .bounded(format!("read of {range}"), session.read_column(range))
            .await?;
        debug!(%range, rows = values.len(), "writer: index read");
        Ok(ColumnValues::new(range.first_row, values))
    }

    async fn bounded<T>(
        &self,
        operation: String,
        call: impl Future<Output = Result<T, RemoteFailure>>,
    ) -> Result<T, RemoteFailure> {
        tokio::time::timeout(self.timeout, call).await.map_err(|_| {
            RemoteFailure::timeout(format!("{operation} abandoned after {:?}", self.timeout))
        })?
    }
}

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod tests;
