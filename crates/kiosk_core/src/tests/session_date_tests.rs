use std::time::{Duration, Instant};

use shared::error::RemoteFailure;

use super::*;
use crate::{
    connection::RetryPolicy,
    shutdown::{shutdown_channel, ShutdownSignal},
    tests::{fast_retry, harness, two_students, SheetLog},
};

fn index(values: &[&str]) -> ColumnValues {
    ColumnValues::new(
        1,
        values
            .iter()
            .map(|value| (!value.is_empty()).then(|| value.to_string()))
            .collect(),
    )
}

#[test]
fn resolves_the_first_matching_row() {
    let index = index(&["", "1/2/2024", "1/3/2024"]);
    assert_eq!(resolve_session_row("1/3/2024", &index), Some(SessionRow(3)));
}

#[test]
fn no_match_means_no_lesson() {
    let index = index(&["Date", "1/2/2024"]);
    assert_eq!(resolve_session_row("2/2/2024", &index), None);
}

#[test]
fn duplicate_dates_resolve_to_the_earliest_row() {
    let index = index(&["1/2/2024", "1/9/2024", "1/9/2024"]);
    assert_eq!(resolve_session_row("1/9/2024", &index), Some(SessionRow(2)));
}

#[test]
fn empty_today_never_matches_empty_cells() {
    let index = index(&["", "", "1/2/2024"]);
    assert_eq!(resolve_session_row("", &index), None);
}

#[test]
fn rendered_dates_drop_leading_zeros() {
    let today = NaiveDate::from_ymd_opt(2024, 1, 3).expect("date");
    assert_eq!(today_string(today, DEFAULT_DATE_FORMAT), "1/3/2024");
    assert_eq!(today_string(today, "%Y-%m-%d"), "2024-01-03");
}

#[test]
fn date_format_validation() {
    assert!(is_valid_date_format(DEFAULT_DATE_FORMAT));
    assert!(is_valid_date_format("%d.%m.%Y"));
    assert!(!is_valid_date_format(""));
    assert!(!is_valid_date_format("%Q"));
}

#[tokio::test]
async fn loads_the_row_through_the_controller() {
    let mut h = harness(
        two_students(),
        SheetLog::with_index(&["", "1/2/2024", "1/3/2024"]),
        fast_retry(Some(3)),
        ShutdownSignal::never(),
    );
    let range = ColumnRange::parse("A1:A66").expect("range");

    let row = load_session_row(&mut h.controller, &range, "1/3/2024")
        .await
        .expect("row");

    assert_eq!(row, Some(SessionRow(3)));
    assert_eq!(h.connector.log.lock().await.reads, vec!["A1:A66".to_string()]);
}

#[tokio::test]
async fn a_failed_read_reconnects_and_retries() {
    let mut h = harness(
        two_students(),
        SheetLog {
            read_failures: [RemoteFailure::transport("connection reset")].into(),
            ..SheetLog::with_index(&["1/3/2024"])
        },
        fast_retry(Some(3)),
        ShutdownSignal::never(),
    );
    let range = ColumnRange::parse("A1:A66").expect("range");

    let row = load_session_row(&mut h.controller, &range, "1/3/2024")
        .await
        .expect("row");

    assert_eq!(row, Some(SessionRow(1)));
    let log = h.connector.log.lock().await;
    assert_eq!(log.connects, 2);
    assert_eq!(log.reads.len(), 2);
    assert_eq!(h.controller.connection().lost_links(), 1);
}

fn slow_retry(initial_backoff: Duration) -> RetryPolicy {
    RetryPolicy {
        initial_backoff,
        max_backoff: initial_backoff * 4,
        ..fast_retry(Some(3))
    }
}

#[tokio::test]
async fn repeated_read_failures_back_off_between_cycles() {
    let mut h = harness(
        two_students(),
        SheetLog {
            read_failures: [
                RemoteFailure::transport("connection reset"),
                RemoteFailure::rejected("quota exceeded"),
            ]
            .into(),
            ..SheetLog::with_index(&["1/3/2024"])
        },
        slow_retry(Duration::from_millis(20)),
        ShutdownSignal::never(),
    );
    let range = ColumnRange::parse("A1:A66").expect("range");

    let started = Instant::now();
    let row = load_session_row(&mut h.controller, &range, "1/3/2024")
        .await
        .expect("row");

    assert_eq!(row, Some(SessionRow(1)));
    // 20ms after the first failure, 40ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(60));
    let log = h.connector.log.lock().await;
    assert_eq!(log.connects, 3);
    assert_eq!(log.reads.len(), 3);
}

#[tokio::test]
async fn shutdown_interrupts_the_backoff_after_a_failed_read() {
    let (trigger, signal) = shutdown_channel();
    let mut h = harness(
        two_students(),
        SheetLog {
            read_failures: [RemoteFailure::transport("connection reset")].into(),
            ..SheetLog::with_index(&["1/3/2024"])
        },
        slow_retry(Duration::from_secs(30)),
        signal,
    );
    let range = ColumnRange::parse("A1:A66").expect("range");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.trigger();
    });
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        load_session_row(&mut h.controller, &range, "1/3/2024"),
    )
    .await
    .expect("backoff was not interrupted");

    assert_eq!(result, Err(ConnectError::Cancelled));
    assert_eq!(h.connector.log.lock().await.reads.len(), 1);
}

#[tokio::test]
async fn shutdown_stops_the_index_load() {
    let (trigger, signal) = shutdown_channel();
    trigger.trigger();
    let mut h = harness(two_students(), SheetLog::default(), fast_retry(None), signal);
    let range = ColumnRange::parse("A1:A66").expect("range");

    let result = load_session_row(&mut h.controller, &range, "1/3/2024").await;

    assert_eq!(result, Err(ConnectError::Cancelled));
}
