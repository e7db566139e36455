use chrono::{
    format::{Item, StrftimeItems},
    NaiveDate,
};
use shared::domain::{ColumnRange, SessionRow};
use tracing::{info, warn};

use crate::{
    connection::ConnectError,
    controller::{Controller, FetchError},
    writer::ColumnValues,
};

pub const DEFAULT_DATE_FORMAT: &str = "%-m/%-d/%Y";

pub fn is_valid_date_format(format: &str) -> bool {
    !format.is_empty() && StrftimeItems::new(format).all(|item| !matches!(item, Item::Error))
}

pub fn today_string(today: NaiveDate, format: &str) -> String {
    today.format(format).to_string()
}

/// First row whose value equals `today`. Empty rows never match.
pub fn resolve_session_row(today: &str, index: &ColumnValues) -> Option<SessionRow> {
    index
        .iter()
        .find(|(_, value)| matches!(value, Some(date) if !date.is_empty() && *date == today))
        .map(|(row, _)| row)
}

/// Reads the index and resolves today's row, reconnecting as often as it
/// takes. Consecutive failures back off per the retry policy. Only a shutdown
/// ends the loop early.
pub async fn load_session_row(
    controller: &mut Controller,
    range: &ColumnRange,
    today: &str,
) -> Result<Option<SessionRow>, ConnectError> {
    let mut failures = 0;
    loop {
        match controller.fetch_index(range).await {
            Ok(index) => {
                let row = resolve_session_row(today, &index);
                match row {
                    Some(row) => info!(%today, %row, "session: lesson row resolved"),
                    None => info!(%today, rows = index.len(), "session: no lesson today"),
                }
                return Ok(row);
            }
            Err(FetchError::Connect(ConnectError::Cancelled)) => {
                return Err(ConnectError::Cancelled);
            }
            Err(FetchError::Connect(error)) => {
                warn!(%error, "session: date index unavailable; starting a new connection cycle");
            }
            Err(FetchError::Remote(failure)) => {
                warn!(%failure, "session: date index read failed; reconnecting");
            }
        }
        failures += 1;
        controller.connection().back_off(failures).await?;
    }
}

#[cfg(test)]
#[path = "tests/session_date_tests.rs"]
mod tests;
