use super::*;
use std::time::{SystemTime, UNIX_EPOCH};

const DEBOUNCE: Duration = Duration::from_millis(50);

#[test]
fn tracker_reports_held_duration_on_release() {
    let start = Instant::now();
    let mut tracker = PressTracker::new(DEBOUNCE);

    assert_eq!(tracker.sample(true, start), None);
    assert_eq!(tracker.sample(true, start + Duration::from_millis(400)), None);
    assert_eq!(
        tracker.sample(false, start + Duration::from_millis(1200)),
        Some(Duration::from_millis(1200))
    );
    assert_eq!(tracker.sample(false, start + Duration::from_millis(1300)), None);
}

#[test]
fn tracker_discards_bounces_shorter_than_debounce() {
    let start = Instant::now();
    let mut tracker = PressTracker::new(DEBOUNCE);

    tracker.sample(true, start);
    assert_eq!(tracker.sample(false, start + Duration::from_millis(10)), None);
}

#[test]
fn suppressed_press_is_ignored_until_release() {
    let start = Instant::now();
    let mut tracker = PressTracker::new(DEBOUNCE);

    tracker.sample(true, start);
    assert!(tracker.suppress());

    assert_eq!(tracker.sample(true, start + Duration::from_millis(500)), None);
    assert_eq!(tracker.sample(false, start + Duration::from_millis(900)), None);

    tracker.sample(true, start + Duration::from_millis(1000));
    assert_eq!(
        tracker.sample(false, start + Duration::from_millis(1100)),
        Some(Duration::from_millis(100))
    );
}

#[test]
fn single_button_long_press_commits_instead_of_scrolling() {
    let gate = Duration::from_secs(2);
    assert_eq!(
        classify_single_press(Duration::from_millis(300), gate),
        KioskEvent::Scroll
    );
    assert_eq!(
        classify_single_press(Duration::from_secs(2), gate),
        KioskEvent::commit()
    );
}

fn temp_pin(name: &str, value: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("attendance_kiosk_{name}_{suffix}"));
    std::fs::write(&path, value).expect("write pin");
    path
}

#[tokio::test]
async fn two_button_layout_reports_mark_with_measured_hold() {
    let scroll = temp_pin("scroll", "0\n");
    let mark = temp_pin("mark", "0\n");
    let mut buttons = GpioButtons::new(GpioButtonsConfig {
        layout: ButtonLayout::TwoButton {
            scroll: scroll.clone(),
            mark: mark.clone(),
        },
        active_low: false,
        poll_interval: Duration::from_millis(5),
        debounce: Duration::from_millis(20),
    });

    std::fs::write(&mark, "1\n").expect("press");
    assert_eq!(buttons.poll_once().await, None);
    tokio::time::sleep(Duration::from_millis(60)).await;
    std::fs::write(&mark, "0\n").expect("release");

    match buttons.poll_once().await {
        Some(KioskEvent::Mark { held }) => assert!(held >= Duration::from_millis(60)),
        other => panic!("expected a mark, got {other:?}"),
    }

    let _ = std::fs::remove_file(scroll);
    let _ = std::fs::remove_file(mark);
}

#[tokio::test]
async fn active_low_pins_treat_zero_as_pressed() {
    let pin = temp_pin("single", "1\n");
    let mut buttons = GpioButtons::new(GpioButtonsConfig {
        layout: ButtonLayout::SingleButton {
            pin: pin.clone(),
            hold_to_mark: Duration::from_secs(2),
        },
        active_low: true,
        poll_interval: Duration::from_millis(5),
        debounce: Duration::from_millis(20),
    });

    std::fs::write(&pin, "0\n").expect("press");
    assert_eq!(buttons.poll_once().await, None);
    tokio::time::sleep(Duration::from_millis(40)).await;
    std::fs::write(&pin, "1\n").expect("release");

    assert_eq!(buttons.poll_once().await, Some(KioskEvent::Scroll));

    let _ = std::fs::remove_file(pin);
}

#[tokio::test]
async fn discard_drops_a_press_started_while_busy() {
    let pin = temp_pin("busy", "0\n");
    let mut buttons = GpioButtons::new(GpioButtonsConfig {
        layout: ButtonLayout::SingleButton {
            pin: pin.clone(),
            hold_to_mark: Duration::from_secs(2),
        },
        active_low: false,
        poll_interval: Duration::from_millis(5),
        debounce: Duration::ZERO,
    });

    std::fs::write(&pin, "1\n").expect("press");
    assert_eq!(buttons.poll_once().await, None);
    assert_eq!(buttons.discard_pending(), 1);
    std::fs::write(&pin, "0\n").expect("release");
    assert_eq!(buttons.poll_once().await, None);

    let _ = std::fs::remove_file(pin);
}
