use crate::domain::exchange::ExchangeRules;
use crate::domain::models::RadioState;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "fake_peripheral".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeripheralSettings {
    /// Local name put in the advertisement, if any
    #[serde(default)]
    pub local_name: Option<String>,
    /// Drop the logical activation state to Idle when the radio powers off
    #[serde(default = "default_false")]
    pub reset_on_power_off: bool,
    /// Radio state the simulated driver reports at startup
    #[serde(default = "default_initial_radio_state")]
    pub initial_radio_state: RadioState,
}

impl Default for PeripheralSettings {
    fn default() -> Self {
        Self {
            local_name: None,
            reset_on_power_off: default_false(),
            initial_radio_state: default_initial_radio_state(),
        }
    }
}

fn default_initial_radio_state() -> RadioState {
    RadioState::PoweredOn
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,
    #[serde(default)]
    pub peripheral: PeripheralSettings,
    #[serde(default)]
    pub exchange: ExchangeRules,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let first_run = !settings_path.exists();
        let service = Self::with_path(settings_path);
        if first_run {
            // Write the defaults out so they can be edited
            service.save()?;
        }
        Ok(service)
    }

    /// Load settings from `settings_path`, falling back to defaults
    pub fn with_path(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                // Logging is not up yet when settings load
                eprintln!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("FakePeripheral");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let mut settings: Settings = serde_json::from_str(&contents)?;
        if let Some(rejected) = settings.exchange.sanitize() {
            eprintln!(
                "Invalid timestamp format '{}' in {}, using '{}'",
                rejected,
                path.display(),
                settings.exchange.timestamp_format
            );
        }
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "fake_peripheral_{}_{}.json",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "peripheral": { "reset_on_power_off": true } }"#).unwrap();
        assert!(settings.peripheral.reset_on_power_off);
        assert_eq!(settings.peripheral.initial_radio_state, RadioState::PoweredOn);
        assert_eq!(settings.log_settings.level, "info");
        assert_eq!(settings.exchange, ExchangeRules::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let path = temp_settings_path("missing");
        let _ = fs::remove_file(&path);
        let service = SettingsService::with_path(path);
        assert_eq!(service.get().log_settings.file_name_prefix, "fake_peripheral");
        assert!(service.get().peripheral.local_name.is_none());
    }

    #[test]
    fn test_invalid_timestamp_format_is_replaced_on_load() {
        let path = temp_settings_path("bad_format");
        fs::write(&path, r#"{ "exchange": { "timestamp_format": "%Q" } }"#).unwrap();

        let service = SettingsService::with_path(path.clone());

        assert_eq!(service.get().exchange, ExchangeRules::default());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_save_and_reload() {
        let path = temp_settings_path("reload");
        let mut service = SettingsService::with_path(path.clone());
        service.settings.peripheral.local_name = Some("FakeApp".to_string());
        service.settings.exchange.enroll_complete_marker = "Enrolled".to_string();
        service.save().unwrap();

        let reloaded = SettingsService::with_path(path.clone());
        assert_eq!(
            reloaded.get().peripheral.local_name.as_deref(),
            Some("FakeApp")
        );
        assert_eq!(reloaded.get().exchange.enroll_complete_marker, "Enrolled");
        let _ = fs::remove_file(&path);
    }
}
