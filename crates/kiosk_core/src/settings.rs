use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

#[cfg(target_os = "linux")]
use hardware::LoggerConfig;
use hardware::{ButtonLayout, GpioButtonsConfig};
use serde::Deserialize;
use sheets_integration::{google::DEFAULT_API_BASE_URL, GoogleSheetsConfig};
use shared::{
    domain::{ColumnRange, Roster, Student},
    error::{AddressError, RosterError},
};
use thiserror::Error;
use url::Url;

use crate::{
    connection::RetryPolicy,
    controller::ControllerConfig,
    dispatcher::BusyEventPolicy,
    feedback::FeedbackTiming,
    session_date::{is_valid_date_format, DEFAULT_DATE_FORMAT},
    writer::CellWriter,
};

pub const DEFAULT_SETTINGS_FILE: &str = "kiosk.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse settings file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("invalid roster: {0}")]
    Roster(#[from] RosterError),
    #[error(transparent)]
    Address(#[from] AddressError),
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub spreadsheet_id: String,
    pub api_base_url: String,
    pub token_file: PathBuf,
    pub date_index_range: String,
    pub date_format: String,
    pub present_value: String,
    pub absent_value: String,
    pub write_timeout_ms: u64,
    pub verify_writes: bool,
    pub long_press_threshold_ms: u64,
    pub busy_events: BusyEventPolicy,
    pub prompt_when_no_lesson: bool,
    pub log_file: Option<PathBuf>,
    pub retry: RetrySettings,
    pub feedback: FeedbackSettings,
    pub hardware: HardwareSettings,
    pub students: Vec<StudentEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.into(),
            token_file: PathBuf::from("token.json"),
            date_index_range: "A1:A66".into(),
            date_format: DEFAULT_DATE_FORMAT.into(),
            present_value: "1".into(),
            absent_value: "0".into(),
            write_timeout_ms: 5_000,
            verify_writes: false,
            long_press_threshold_ms: 1_000,
            busy_events: BusyEventPolicy::Drop,
            prompt_when_no_lesson: true,
            log_file: None,
            retry: RetrySettings::default(),
            feedback: FeedbackSettings::default(),
            hardware: HardwareSettings::default(),
            students: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// `0` retries without bound.
    pub max_attempts: u32,
    pub attempt_timeout_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
            max_attempts: 10,
            attempt_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedbackSettings {
    pub ack_pulse_ms: u64,
    pub ack_pulses: u32,
    pub fail_hold_ms: u64,
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            ack_pulse_ms: 200,
            ack_pulses: 2,
            fail_hold_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Gpio,
    Logger,
    Stdin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    TwoButton,
    SingleButton,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    Lcd,
    Console,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareSettings {
    pub input: InputKind,
    pub layout: LayoutKind,
    pub scroll_pin: PathBuf,
    pub mark_pin: PathBuf,
    pub logger_scroll_dir: PathBuf,
    pub logger_mark_dir: PathBuf,
    pub active_low: bool,
    pub poll_interval_ms: u64,
    pub debounce_ms: u64,
    pub single_button_hold_ms: u64,
    pub green_led: PathBuf,
    pub red_led: PathBuf,
    pub display: DisplayKind,
    pub lcd_device: PathBuf,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            input: InputKind::Gpio,
            layout: LayoutKind::TwoButton,
            scroll_pin: PathBuf::from("/sys/class/gpio/gpio44/value"),
            mark_pin: PathBuf::from("/sys/class/gpio/gpio68/value"),
            logger_scroll_dir: PathBuf::from("/sys/logger/gpio44"),
            logger_mark_dir: PathBuf::from("/sys/logger/gpio68"),
            active_low: false,
            poll_interval_ms: 10,
            debounce_ms: 50,
            single_button_hold_ms: 2_000,
            green_led: PathBuf::from("/sys/class/gpio/gpio69/value"),
            red_led: PathBuf::from("/sys/class/gpio/gpio45/value"),
            display: DisplayKind::Lcd,
            lcd_device: PathBuf::from("/dev/lcd"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudentEntry {
    pub name: String,
    pub column: String,
}

/// Reads `path`, or `kiosk.toml` when it exists and no path is given, then
/// applies `APP__*` environment overrides and validates the result.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, SettingsError> {
    let mut settings = match path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_SETTINGS_FILE);
            if default_path.exists() {
                read_settings_file(default_path)?
            } else {
                Settings::default()
            }
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings.validate()?;
    Ok(settings)
}

pub fn parse_settings(raw: &str, origin: &Path) -> Result<Settings, SettingsError> {
    toml::from_str(raw).map_err(|source| SettingsError::Parse {
        path: origin.to_path_buf(),
        source,
    })
}

fn read_settings_file(path: &Path) -> Result<Settings, SettingsError> {
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&raw, path)
}

pub fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("APP__SPREADSHEET_ID") {
        settings.spreadsheet_id = v;
    }
    if let Some(v) = lookup("APP__TOKEN_FILE") {
        settings.token_file = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = lookup("APP__LOG_FILE") {
        settings.log_file = if v.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(v))
        };
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(SettingsError::invalid("spreadsheet_id", "must be set"));
        }
        self.api_url()?;
        if !is_valid_date_format(&self.date_format) {
            return Err(SettingsError::invalid(
                "date_format",
                format!("'{}' is not a valid strftime format", self.date_format),
            ));
        }
        self.date_index_range()?;
        if self.write_timeout_ms == 0 {
            return Err(SettingsError::invalid("write_timeout_ms", "must be positive"));
        }
        if self.retry.attempt_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "retry.attempt_timeout_ms",
                "must be positive",
            ));
        }
        if self.hardware.poll_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "hardware.poll_interval_ms",
                "must be positive",
            ));
        }
        let inputs = match self.hardware.input {
            InputKind::Gpio if self.hardware.layout == LayoutKind::TwoButton => vec![
                ("hardware.scroll_pin", &self.hardware.scroll_pin),
                ("hardware.mark_pin", &self.hardware.mark_pin),
            ],
            InputKind::Gpio => vec![("hardware.scroll_pin", &self.hardware.scroll_pin)],
            InputKind::Logger => vec![
                ("hardware.logger_scroll_dir", &self.hardware.logger_scroll_dir),
                ("hardware.logger_mark_dir", &self.hardware.logger_mark_dir),
            ],
            InputKind::Stdin => Vec::new(),
        };
        if let Some((key, _)) = inputs.into_iter().find(|(_, path)| path.as_os_str().is_empty()) {
            return Err(SettingsError::invalid(key, "input path is empty"));
        }
        self.roster()?;
        Ok(())
    }

    pub fn roster(&self) -> Result<Roster, SettingsError> {
        let students = self
            .students
            .iter()
            .map(|entry| Student::new(entry.name.trim(), &entry.column))
            .collect::<Result<Vec<_>, _>>()
            .map_err(RosterError::from)?;
        Ok(Roster::new(students)?)
    }

    pub fn date_index_range(&self) -> Result<ColumnRange, AddressError> {
        ColumnRange::parse(&self.date_index_range)
    }

    pub fn api_url(&self) -> Result<Url, SettingsError> {
        Url::parse(&self.api_base_url).map_err(|error| {
            SettingsError::invalid("api_base_url", format!("'{}': {error}", self.api_base_url))
        })
    }

    pub fn sheets_config(&self) -> Result<GoogleSheetsConfig, SettingsError> {
        Ok(GoogleSheetsConfig {
            api_base_url: self.api_url()?,
            spreadsheet_id: self.spreadsheet_id.trim().to_string(),
            token_file: self.token_file.clone(),
            request_timeout: self.write_timeout().max(self.attempt_timeout()),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            multiplier: self.retry.multiplier,
            max_attempts: (self.retry.max_attempts > 0).then_some(self.retry.max_attempts),
            attempt_timeout: self.attempt_timeout(),
        }
    }

    pub fn feedback_timing(&self) -> FeedbackTiming {
        FeedbackTiming {
            ack_pulse: Duration::from_millis(self.feedback.ack_pulse_ms),
            ack_pulses: self.feedback.ack_pulses,
            fail_hold: Duration::from_millis(self.feedback.fail_hold_ms),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            long_press_threshold: self.long_press_threshold(),
            present_value: self.present_value.clone(),
            absent_value: self.absent_value.clone(),
        }
    }

    pub fn cell_writer(&self) -> CellWriter {
        CellWriter::new(self.write_timeout(), self.verify_writes)
    }

    pub fn gpio_buttons_config(&self) -> GpioButtonsConfig {
        let hw = &self.hardware;
        let layout = match hw.layout {
            LayoutKind::TwoButton => ButtonLayout::TwoButton {
                scroll: hw.scroll_pin.clone(),
                mark: hw.mark_pin.clone(),
            },
            LayoutKind::SingleButton => ButtonLayout::SingleButton {
                pin: hw.scroll_pin.clone(),
                hold_to_mark: Duration::from_millis(hw.single_button_hold_ms),
            },
        };
        GpioButtonsConfig {
            layout,
            active_low: hw.active_low,
            poll_interval: Duration::from_millis(hw.poll_interval_ms),
            debounce: Duration::from_millis(hw.debounce_ms),
        }
    }

    #[cfg(target_os = "linux")]
    pub fn logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            scroll_dir: self.hardware.logger_scroll_dir.clone(),
            mark_dir: self.hardware.logger_mark_dir.clone(),
        }
    }

    pub fn long_press_threshold(&self) -> Duration {
        Duration::from_millis(self.long_press_threshold_ms)
    }

    fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.retry.attempt_timeout_ms)
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
