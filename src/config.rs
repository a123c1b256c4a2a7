//! Persistent scope configuration
//!
//! Stored as TOML under the user config directory. A missing file is created
//! with defaults on first start; an existing one is validated before use.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::analysis::TestKind;
use crate::capture::handle::CaptureHandleSettings;
use crate::capture::machine::{CaptureSettings, ResetPolicy};

const CONFIG_DIR: &str = "stickscope";
const CONFIG_FILE: &str = "config.toml";
const EXPORT_DIR: &str = "captures";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub movement_threshold: u8,
    pub origin_timeout_ms: u64,
    pub max_samples: usize,
    pub cooldown_cycles: u8,
    pub reset_policy: ResetPolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let defaults = CaptureSettings::default();
        Self {
            movement_threshold: defaults.movement_threshold,
            origin_timeout_ms: defaults.origin_timeout_us / 1000,
            max_samples: defaults.max_samples,
            cooldown_cycles: defaults.cooldown_cycles,
            reset_policy: defaults.reset_policy,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    pub normal_hz: u32,
    pub high_hz: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            normal_hz: 120,
            high_hz: 1000,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Presentation cycles per second; one cycle is one cooldown step
    pub refresh_hz: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { refresh_hz: 60 }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Overrides the default `captures` directory beside the config file
    pub directory: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ScopeConfig {
    pub default_test: TestKind,
    pub capture: CaptureConfig,
    pub polling: PollingConfig,
    pub display: DisplayConfig,
    pub export: ExportConfig,
}

impl ScopeConfig {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| eyre!("No config directory available"))?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Loads the config from the default path, writing defaults if missing
    pub async fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::load_or_create(&path).await
    }

    pub async fn load_or_create(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Self::load(path).await;
        }

        warn!("Config file {} does not exist, writing defaults", path.display());
        let config = Self::default();
        config.save(path).await?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file: {}", e))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        debug!("Config: {:?}", config);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;
        info!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let capture = &self.capture;
        if capture.movement_threshold == 0 || capture.movement_threshold > 127 {
            return Err(eyre!(
                "capture.movement_threshold must be within 1..=127, got {}",
                capture.movement_threshold
            ));
        }
        if capture.origin_timeout_ms == 0 {
            return Err(eyre!("capture.origin_timeout_ms must be positive"));
        }
        if capture.max_samples == 0 {
            return Err(eyre!("capture.max_samples must be positive"));
        }
        if self.polling.normal_hz == 0 || self.polling.high_hz == 0 {
            return Err(eyre!("polling rates must be positive"));
        }
        if self.polling.high_hz < self.polling.normal_hz {
            return Err(eyre!(
                "polling.high_hz ({}) is below polling.normal_hz ({})",
                self.polling.high_hz,
                self.polling.normal_hz
            ));
        }
        if self.display.refresh_hz == 0 {
            return Err(eyre!("display.refresh_hz must be positive"));
        }
        Ok(())
    }

    /// Directory exports are written to
    pub fn export_dir(&self) -> Result<PathBuf> {
        match &self.export.directory {
            Some(dir) => Ok(dir.clone()),
            None => {
                let mut path =
                    dirs::config_dir().ok_or_else(|| eyre!("No config directory available"))?;
                path.push(CONFIG_DIR);
                path.push(EXPORT_DIR);
                Ok(path)
            }
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            movement_threshold: self.capture.movement_threshold,
            origin_timeout_us: self.capture.origin_timeout_ms * 1000,
            cooldown_cycles: self.capture.cooldown_cycles,
            max_samples: self.capture.max_samples,
            reset_policy: self.capture.reset_policy,
        }
    }

    pub fn handle_settings(&self) -> CaptureHandleSettings {
        CaptureHandleSettings {
            capture: self.capture_settings(),
            cycle_interval: Duration::from_micros(
                1_000_000 / u64::from(self.display.refresh_hz.max(1)),
            ),
            high_rate_hz: self.polling.high_hz,
            normal_rate_hz: self.polling.normal_hz,
        }
    }
}
