use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

use crate::matcher::DEFAULT_THRESHOLD;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    pub log: LogConfig,
    pub matching: MatchingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LogConfig {
    /// Metadata lines preceding the participant header in exports.
    pub skip_rows: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MatchingConfig {
    pub threshold: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutputConfig {
    /// Empty means "next to each input file".
    pub directory: String,
    pub decimal_places: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig { skip_rows: 3 },
            matching: MatchingConfig {
                threshold: DEFAULT_THRESHOLD,
            },
            output: OutputConfig {
                directory: String::new(),
                decimal_places: 2,
            },
        }
    }
}

thread_local! {
    static TEST_CONFIG_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
}

#[cfg(test)]
pub fn set_test_config_path(path: PathBuf) {
    TEST_CONFIG_PATH.with(|p| *p.borrow_mut() = Some(path));
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        #[cfg(test)]
        {
            if let Some(path) = TEST_CONFIG_PATH.with(|p| p.borrow().clone()) {
                return Ok(path);
            }
        }

        Ok(dirs::home_dir()
            .context("Could not find home directory")?
            .join(".rollcall.toml"))
    }

    pub fn load() -> Result<Option<Config>> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(Some(config))
    }

    pub fn save(&self, silent: bool) -> Result<()> {
        let config_path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&config_path, content).context("Failed to write config file")?;

        if !silent {
            println!("Configuration saved to: {}", config_path.display());
        }

        Ok(())
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        (!self.output.directory.is_empty()).then(|| PathBuf::from(&self.output.directory))
    }
}

// CLI helper functions
pub fn create_default_config(overwrite: bool) -> Result<()> {
    let config = Config::default();
    if !std::fs::exists(Config::config_path()?)? || overwrite {
        config.save(true)?;

        println!("Created default configuration file.");
        println!("Edit it with:");
        println!("   rollcall config set threshold 90");
        println!("or");
        println!("   {}", Config::config_path()?.display());
    } else {
        println!("Configuration already exists.  Pass `--overwrite` to overwrite.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    match Config::load()? {
        Some(config) => {
            println!("Current configuration:");
            println!("   Skip Rows: {}", config.log.skip_rows);
            println!("   Match Threshold: {}", config.matching.threshold);
            println!(
                "   Output Directory: {}",
                if config.output.directory.is_empty() {
                    "Next to input"
                } else {
                    config.output.directory.as_str()
                }
            );
            println!("   Decimal Places: {}", config.output.decimal_places);
        }
        None => {
            println!("No configuration file found.");
            println!("   Run 'rollcall config init' to create one.");
        }
    }
    Ok(())
}

pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let mut config = Config::load()?.unwrap_or_default();

    match key {
        "skip-rows" => {
            config.log.skip_rows = value.parse::<usize>().context("Invalid number value")?;
        }
        "threshold" => {
            let threshold = value.parse::<f64>().context("Invalid number value")?;
            if !(0.0..=100.0).contains(&threshold) {
                anyhow::bail!("Threshold must be between 0 and 100, got {}", threshold);
            }
            config.matching.threshold = threshold;
        }
        "output-dir" => {
            config.output.directory = value.to_string();
        }
        "decimal-places" => {
            config.output.decimal_places =
                value.parse::<usize>().context("Invalid number value")?;
        }
        _ => anyhow::bail!("Unknown config key: {}", key),
    }

    config.save(false)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_config() -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("tempdir");
        let config_path = dir.path().join(".rollcall.toml");
        set_test_config_path(config_path.clone());
        (dir, config_path)
    }

    #[test]
    fn default_config_round_trip() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        let loaded = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert_eq!(loaded, Config::default());
        assert_eq!(loaded.log.skip_rows, 3);
        assert_eq!(loaded.matching.threshold, 85.0);
        assert!(loaded.output_dir().is_none());
    }

    #[test]
    fn missing_config_loads_as_none() {
        let (_dir, _path) = setup_test_config();
        assert!(Config::load().expect("load config").is_none());
    }

    #[test]
    fn set_config_value_behaviour() {
        let (_dir, _path) = setup_test_config();
        create_default_config(true).expect("create_default_config");

        set_config_value("skip-rows", "0").expect("set skip-rows");
        set_config_value("threshold", "90.5").expect("set threshold");
        set_config_value("output-dir", "/tmp/reports").expect("set output-dir");
        set_config_value("decimal-places", "1").expect("set decimal-places");

        let cfg = Config::load()
            .expect("load config")
            .expect("config should exist");

        assert_eq!(cfg.log.skip_rows, 0);
        assert_eq!(cfg.matching.threshold, 90.5);
        assert_eq!(cfg.output_dir(), Some(PathBuf::from("/tmp/reports")));
        assert_eq!(cfg.output.decimal_places, 1);

        let err = set_config_value("unknown-key", "value").unwrap_err();
        let msg = format!("{err}");
        assert!(
            msg.contains("Unknown config key"),
            "unexpected error message: {msg}"
        );
        let err = set_config_value("threshold", "250").unwrap_err();
        assert!(format!("{err}").contains("between 0 and 100"));
        let err = set_config_value("skip-rows", "-1").unwrap_err();
        assert!(format!("{err}").contains("Invalid number value"));
    }
}
