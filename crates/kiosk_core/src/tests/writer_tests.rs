use shared::{domain::ColumnKey, error::RemoteFailureKind};

use super::*;
use crate::tests::{FakeConnector, SheetLog};

async fn session(log: SheetLog) -> (FakeConnector, std::sync::Arc<dyn SheetSession>) {
    use sheets_integration::SheetConnector;

    let connector = FakeConnector::new(log);
    let session = connector.connect().await.expect("session");
    (connector, session)
}

fn write(address: &str, value: &str) -> PendingWrite {
    PendingWrite {
        address: CellAddress::parse(address).expect("address"),
        value: value.into(),
    }
}

#[tokio::test]
async fn writes_the_value_to_the_cell() {
    let (connector, session) = session(SheetLog::default()).await;
    let writer = CellWriter::new(Duration::from_millis(200), false);

    writer
        .write_mark(session.as_ref(), &write("D5", "1"))
        .await
        .expect("write");

    let log = connector.log.lock().await;
    assert_eq!(log.writes, vec![("D5".to_string(), "1".to_string())]);
    assert!(log.reads.is_empty());
}

#[tokio::test]
async fn remote_rejection_is_reported_unchanged() {
    let (_, session) = session(SheetLog {
        write_failures: [RemoteFailure::rejected("403 forbidden")].into(),
        ..SheetLog::default()
    })
    .await;
    let writer = CellWriter::new(Duration::from_millis(200), false);

    let failure = writer
        .write_mark(session.as_ref(), &write("C2", "0"))
        .await
        .expect_err("rejected");

    assert_eq!(failure.kind, RemoteFailureKind::Rejected);
}

#[tokio::test]
async fn a_hung_write_times_out() {
    let (connector, session) = session(SheetLog {
        hang_writes: true,
        ..SheetLog::default()
    })
    .await;
    let writer = CellWriter::new(Duration::from_millis(20), false);

    let failure = writer
        .write_mark(session.as_ref(), &write("C2", "1"))
        .await
        .expect_err("timeout");

    assert_eq!(failure.kind, RemoteFailureKind::Timeout);
    assert!(connector.log.lock().await.writes.is_empty());
}

#[tokio::test]
async fn verified_write_reads_the_cell_back() {
    let (connector, session) = session(SheetLog::default()).await;
    let writer = CellWriter::new(Duration::from_millis(200), true);

    writer
        .write_mark(session.as_ref(), &write("D5", "1"))
        .await
        .expect("write");

    assert_eq!(connector.log.lock().await.reads, vec!["D5".to_string()]);
}

#[tokio::test]
async fn verified_write_fails_on_a_mismatched_read_back() {
    let (_, session) = session(SheetLog {
        stale_read_back: Some("0".into()),
        ..SheetLog::default()
    })
    .await;
    let writer = CellWriter::new(Duration::from_millis(200), true);

    let failure = writer
        .write_mark(session.as_ref(), &write("D5", "1"))
        .await
        .expect_err("mismatch");

    assert_eq!(failure.kind, RemoteFailureKind::Rejected);
}

#[tokio::test]
async fn index_rows_line_up_with_sheet_rows() {
    let (_, session) = session(SheetLog::with_index(&["", "1/2/2024", "1/3/2024"])).await;
    let writer = CellWriter::new(Duration::from_millis(200), false);
    let range = ColumnRange {
        column: ColumnKey::parse("A").expect("column"),
        first_row: 2,
        last_row: Some(10),
    };

    let index = writer.read_index(session.as_ref(), &range).await.expect("read");

    let rows: Vec<_> = index.iter().collect();
    assert_eq!(
        rows,
        vec![
            (SessionRow(2), None),
            (SessionRow(3), Some("1/2/2024")),
            (SessionRow(4), Some("1/3/2024")),
        ]
    );
}
