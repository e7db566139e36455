use std::sync::Arc;

use async_trait::async_trait;
use shared::{
    domain::{CellAddress, ColumnRange},
    error::RemoteFailure,
};

pub mod google;

pub use google::{GoogleSheetsConfig, GoogleSheetsConnector};

/// A usable link to one spreadsheet.
#[async_trait]
pub trait SheetSession: Send + Sync {
    /// Overwrites a single cell. The store interprets `value` as user entered data.
    async fn write_cell(&self, address: &CellAddress, value: &str) -> Result<(), RemoteFailure>;

    /// Reads a single-column range. Element `i` holds row `range.first_row + i`;
    /// missing or empty cells are `None`. Trailing empty rows may be omitted.
    async fn read_column(&self, range: &ColumnRange) -> Result<Vec<Option<String>>, RemoteFailure>;
}

#[async_trait]
pub trait SheetConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn SheetSession>, RemoteFailure>;
}
