use crate::common::{config_directory, HOME_PAGE};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

pub const DEFAULT_LEVELS: [u32; 5] = [0, 10, 30, 60, 100];

#[derive(Debug, Deserialize, Serialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct BcConfig {
    /// Brightness levels (percent) offered in the tray menu and used for stepping
    #[validate(custom = "validate_levels")]
    pub levels: Vec<u32>,
    /// When set, `levels` is ignored and this many evenly spaced levels are used instead
    #[validate(range(min = 2, max = 21))]
    pub level_count: Option<usize>,
    #[validate(range(min = 1, max = 100))]
    pub wheel_step: u32,
    /// Wrap around to the other end when stepping past the last level
    pub cycle: bool,
    /// The raw WMI brightness value that corresponds to 100%
    #[validate(range(min = 1, max = 255))]
    pub wmi_reported_max: u32,
    #[validate(range(max = 10000))]
    pub display_change_delay_ms: u64,
    pub about_url: String,
}

impl Default for BcConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.to_vec(),
            level_count: None,
            wheel_step: 10,
            cycle: false,
            wmi_reported_max: 48,
            display_change_delay_ms: 500,
            about_url: HOME_PAGE.to_owned(),
        }
    }
}

#[allow(clippy::ptr_arg)]
fn validate_levels(levels: &Vec<u32>) -> Result<(), ValidationError> {
    if levels.is_empty() {
        return Err(ValidationError::new("levels_empty"));
    }
    if levels.iter().any(|l| *l > 100) {
        return Err(ValidationError::new("level_above_100"));
    }
    Ok(())
}

impl BcConfig {
    /// Returns `None` when the file does not exist
    pub fn load(path_override: Option<PathBuf>) -> anyhow::Result<Option<Self>> {
        let path = match path_override {
            Some(path) => path,
            None => get_default_config_path()?,
        };
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Unable to read file {:?}", path))?;
        let config = serde_json::from_str::<BcConfig>(&contents)
            .context("Unable to deserialize config")?;
        config.validate().context("Invalid config")?;
        log::debug!("Loaded config from {:?}", path);
        Ok(Some(config))
    }

    pub fn load_or_default(path_override: Option<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::load(path_override)?.unwrap_or_else(|| {
            log::info!("No config file found, using defaults");
            Self::default()
        }))
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&get_default_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let serialised = serde_json::to_string_pretty(self)?;
        let parent = path.parent().context("Config path has no parent")?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(serialised.as_bytes())?;
        temp_file
            .persist(path)
            .context("Unable to replace config file")?;
        log::debug!("Successfully saved config to {:?}", path);
        Ok(())
    }
}

pub fn get_default_config_path() -> anyhow::Result<PathBuf> {
    Ok(config_directory()?.join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(BcConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = BcConfig::load(Some(dir.path().join("config.json"))).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = BcConfig {
            levels: vec![5, 50, 95],
            cycle: true,
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        let loaded = BcConfig::load(Some(path)).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "wheel_step": 5 }"#).unwrap();
        let loaded = BcConfig::load(Some(path)).unwrap().unwrap();
        assert_eq!(loaded.wheel_step, 5);
        assert_eq!(loaded.levels, DEFAULT_LEVELS.to_vec());
        assert_eq!(loaded.wmi_reported_max, 48);
    }

    #[test]
    fn rejects_out_of_range_levels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "levels": [10, 150] }"#).unwrap();
        assert!(BcConfig::load(Some(path)).is_err());
    }

    #[test]
    fn rejects_zero_wheel_step() {
        let config = BcConfig {
            wheel_step: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_levels() {
        let config = BcConfig {
            levels: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
