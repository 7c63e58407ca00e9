use anyhow::{Context, Result, anyhow};
use maple_loader_lib::{SerialSettings, UploadConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 偏好设置键名
pub mod keys {
    pub const SERIAL_PORT: &str = "serial.port";
    pub const SERIAL_PARITY: &str = "serial.parity";
    pub const SERIAL_DATABITS: &str = "serial.databits";
    pub const SERIAL_STOPBITS: &str = "serial.stopbits";
    pub const SERIAL_RATE: &str = "serial.debug_rate";
    pub const USB_ID: &str = "upload.usbID";
    pub const ALT_ID: &str = "upload.altID";
    pub const AUTO_RESET: &str = "upload.auto_reset";
    pub const VERBOSE: &str = "upload.verbose";
    pub const TOOL_PATH: &str = "upload.tool_path";
    pub const PROGRAM_DELAY: &str = "programDelay";
}

/// 应用程序的默认配置值
pub struct Defaults;

impl Defaults {
    pub const PARITY: &'static str = "N";
    pub const DATABITS: i64 = 8;
    pub const STOPBITS: i64 = 1;
    pub const RATE: i64 = 9600;
    pub const USB_ID: &'static str = "1EAF:0003";
    pub const ALT_ID: &'static str = "1";
    pub const VERBOSE: bool = false;
    pub const PROGRAM_DELAY_MS: i64 = 50;
}

/// Typed key/value preference store, optionally loaded from a JSON object.
///
/// Values may be stored as JSON strings, numbers or booleans; the typed
/// getters accept either the native JSON type or its string spelling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Preferences {
    values: Map<String, Value>,
}

impl Preferences {
    /// 创建一个具有所有默认值的配置
    pub fn with_defaults() -> Self {
        let mut prefs = Self::default();
        prefs.set(keys::SERIAL_PARITY, Defaults::PARITY);
        prefs.set_int(keys::SERIAL_DATABITS, Defaults::DATABITS);
        prefs.set_int(keys::SERIAL_STOPBITS, Defaults::STOPBITS);
        prefs.set_int(keys::SERIAL_RATE, Defaults::RATE);
        prefs.set(keys::USB_ID, Defaults::USB_ID);
        prefs.set(keys::ALT_ID, Defaults::ALT_ID);
        prefs.set_bool(keys::VERBOSE, Defaults::VERBOSE);
        prefs.set_int(keys::PROGRAM_DELAY, Defaults::PROGRAM_DELAY_MS);
        prefs
    }

    /// 从 JSON 文件加载配置，未出现的键使用默认值
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let loaded: Preferences = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))?;

        let mut prefs = Self::with_defaults();
        prefs.values.extend(loaded.values);
        Ok(prefs)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Missing or unparsable values read as `false`.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get_opt_bool(key).unwrap_or(false)
    }

    pub fn get_opt_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(s.trim().eq_ignore_ascii_case("true")),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values
            .insert(key.to_string(), Value::String(value.into()));
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), Value::from(value));
    }

    pub fn set_bool(&mut self, key: &str, value: bool) {
        self.values.insert(key.to_string(), Value::Bool(value));
    }

    fn require(&self, key: &str) -> Result<String> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("Missing preference '{}'", key))
    }

    fn require_int(&self, key: &str) -> Result<i64> {
        self.get_int(key)
            .ok_or_else(|| anyhow!("Preference '{}' must be an integer", key))
    }

    pub fn serial_settings(&self) -> Result<SerialSettings> {
        let baud = u32::try_from(self.require_int(keys::SERIAL_RATE)?)
            .context("Invalid serial.debug_rate")?;
        let data_bits = u8::try_from(self.require_int(keys::SERIAL_DATABITS)?)
            .context("Invalid serial.databits")?;
        let stop_bits = u8::try_from(self.require_int(keys::SERIAL_STOPBITS)?)
            .context("Invalid serial.stopbits")?;
        let parity = self.require(keys::SERIAL_PARITY)?;
        SerialSettings::from_preferences(baud, &parity, data_bits, stop_bits)
            .context("Invalid serial settings")
    }

    /// Reads every preference the upload needs, once.
    pub fn to_upload_config(&self, image_path: impl Into<PathBuf>) -> Result<UploadConfig> {
        let mut config = UploadConfig::new(
            self.require(keys::SERIAL_PORT)?,
            self.require(keys::ALT_ID)?,
            self.require(keys::USB_ID)?,
            image_path,
        );
        config.auto_reset = self.get_opt_bool(keys::AUTO_RESET);
        config.verbose = self.get_bool(keys::VERBOSE);

        let delay = self.require_int(keys::PROGRAM_DELAY)?;
        let delay = u64::try_from(delay)
            .map_err(|_| anyhow!("programDelay must not be negative, got {}", delay))?;
        config.program_delay = Duration::from_millis(delay);

        if let Some(tool_path) = self.get(keys::TOOL_PATH) {
            config.tool_base_path = PathBuf::from(tool_path);
        }
        config.serial = self.serial_settings()?;
        Ok(config)
    }
}
