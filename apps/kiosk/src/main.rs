use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use hardware::{
    CharLcd, ConsoleDisplay, Display, DisplayLine, EventSource, GpioButtons, Indicator,
    LogIndicator, StdinEvents, SysfsIndicator,
};
use kiosk_core::{
    load_session_row, load_settings,
    settings::{DisplayKind, InputKind},
    shutdown_channel, today_string, ConnectionManager, Controller, ControllerState, Dispatcher,
    Feedback, Settings, ShutdownSignal, ShutdownTrigger,
};
use sheets_integration::GoogleSheetsConnector;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

type StdinLines = Lines<BufReader<Stdin>>;

#[derive(Parser, Debug)]
#[command(about = "Button-driven attendance kiosk backed by a Google spreadsheet")]
struct Args {
    /// Settings file; defaults to ./kiosk.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Read button commands from stdin and log instead of driving the LCD and LEDs.
    #[arg(long)]
    bench: bool,
    /// Date text to look up instead of today's date.
    #[arg(long)]
    today: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.config.as_deref()).context("failed to load settings")?;
    init_tracing(settings.log_file.as_deref())?;

    let (trigger, shutdown) = shutdown_channel();
    spawn_signal_listener(trigger);

    let bench = args.bench;
    let mut controller = build_controller(&settings, bench, shutdown.clone())?;
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let today = args
        .today
        .unwrap_or_else(|| today_string(Local::now().date_naive(), &settings.date_format));
    let range = settings
        .date_index_range()
        .context("invalid date_index_range")?;
    info!(%today, %range, students = controller.roster().len(), "kiosk: starting");
    controller.show("Connecting", DisplayLine::First);

    let session_row = match load_session_row(&mut controller, &range, &today).await {
        Ok(row) => row,
        Err(error) => {
            info!(%error, "kiosk: stopped before the lesson was resolved");
            controller.reset_hardware();
            return Ok(());
        }
    };

    match session_row {
        Some(row) => {
            info!(%row, "kiosk: taking roll");
            controller.feedback_mut().ack().await;
            controller.show("Take roll", DisplayLine::First);
        }
        None => {
            controller.feedback_mut().fail().await;
            controller.show("No lesson today", DisplayLine::First);
            if settings.prompt_when_no_lesson
                && !confirm_without_lesson(&mut stdin, shutdown.clone()).await
            {
                info!("kiosk: no lesson today, exiting");
                controller.reset_hardware();
                return Ok(());
            }
        }
    }

    let mut state = ControllerState::new(session_row);
    let input = if bench {
        InputKind::Stdin
    } else {
        settings.hardware.input
    };
    let dispatched = match input {
        InputKind::Stdin => {
            let source = StdinEvents::new(stdin, settings.long_press_threshold());
            dispatch(source, &settings, shutdown, &mut controller, &mut state).await;
            Ok(())
        }
        InputKind::Gpio => {
            let source = GpioButtons::new(settings.gpio_buttons_config());
            dispatch(source, &settings, shutdown, &mut controller, &mut state).await;
            Ok(())
        }
        InputKind::Logger => dispatch_logger(&settings, shutdown, &mut controller, &mut state).await,
    };

    controller.reset_hardware();
    dispatched?;
    info!(
        lost_links = controller.connection().lost_links(),
        "kiosk: stopped"
    );
    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file '{}'", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

fn build_controller(settings: &Settings, bench: bool, shutdown: ShutdownSignal) -> Result<Controller> {
    let roster = settings.roster().context("invalid roster")?;
    let sheets = settings.sheets_config().context("invalid sheets settings")?;
    let connector =
        GoogleSheetsConnector::new(sheets).context("failed to build the sheets http client")?;
    let connection = ConnectionManager::new(Arc::new(connector), settings.retry_policy(), shutdown);

    let hw = &settings.hardware;
    let display: Box<dyn Display> = if bench || hw.display == DisplayKind::Console {
        Box::new(ConsoleDisplay)
    } else {
        Box::new(CharLcd::new(&hw.lcd_device))
    };
    let indicator: Box<dyn Indicator> = if bench {
        Box::new(LogIndicator)
    } else {
        Box::new(SysfsIndicator::new(&hw.green_led, &hw.red_led))
    };

    Ok(Controller::new(
        roster,
        settings.controller_config(),
        connection,
        settings.cell_writer(),
        display,
        Feedback::new(indicator, settings.feedback_timing()),
    ))
}

async fn dispatch<S: EventSource>(
    source: S,
    settings: &Settings,
    shutdown: ShutdownSignal,
    controller: &mut Controller,
    state: &mut ControllerState,
) {
    let mut dispatcher = Dispatcher::new(source, settings.busy_events, shutdown);
    let summary = dispatcher.run(controller, state).await;
    info!(
        handled = summary.handled,
        dropped = summary.dropped,
        exit = ?summary.exit,
        "kiosk: dispatcher finished"
    );
}

#[cfg(target_os = "linux")]
async fn dispatch_logger(
    settings: &Settings,
    shutdown: ShutdownSignal,
    controller: &mut Controller,
    state: &mut ControllerState,
) -> Result<()> {
    let source = hardware::LoggerEvents::new(settings.logger_config())
        .context("failed to watch the attendance logger's sysfs attributes")?;
    dispatch(source, settings, shutdown, controller, state).await;
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn dispatch_logger(
    _settings: &Settings,
    _shutdown: ShutdownSignal,
    _controller: &mut Controller,
    _state: &mut ControllerState,
) -> Result<()> {
    anyhow::bail!("hardware.input = \"logger\" is only available on Linux")
}

/// Asks the operator whether to keep running without a lesson. Only `q`
/// quits; a closed stdin keeps the kiosk running.
async fn confirm_without_lesson(stdin: &mut StdinLines, mut shutdown: ShutdownSignal) -> bool {
    println!("No lesson today. Press Enter to continue or q to quit.");
    let line = tokio::select! {
        line = stdin.next_line() => line,
        _ = shutdown.triggered() => return false,
    };
    match line {
        Ok(Some(line)) => !line.trim().eq_ignore_ascii_case("q"),
        Ok(None) => true,
        Err(error) => {
            warn!(%error, "kiosk: failed to read stdin");
            true
        }
    }
}

fn spawn_signal_listener(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("kiosk: shutdown requested");
        trigger.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(error) => {
            warn!(%error, "kiosk: SIGTERM handler unavailable");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "kiosk: ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
