use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};

use crate::error::{RegressError, Result};
use crate::tolerance::Tolerance;

pub const CONFIG_FILE_NAME: &str = "regtest.toml";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const REBASE_ENV_VAR: &str = "REGTEST_REBASE";

/// Built-in default tolerance for table columns.
pub const TABLE_DEFAULT_TOLERANCE: Tolerance = Tolerance::new(1e-8, 1e-8);
/// Built-in default tolerance for arrays.
pub const ARRAY_DEFAULT_TOLERANCE: Tolerance = Tolerance::new(1e-10, 1e-10);
/// Built-in default tolerance for scalar sequences.
pub const VALUE_DEFAULT_TOLERANCE: Tolerance = Tolerance::new(1e-10, 1e-10);

/// Default tolerances per data kind, overriding the built-in ones.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct KindTolerances {
    pub table: Option<Tolerance>,
    pub array: Option<Tolerance>,
    pub value: Option<Tolerance>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Root of the input/baseline/obtained trees, relative to the project root.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Global rebase switch: overwrite baselines on mismatch.
    #[serde(default)]
    pub rebase: bool,
    #[serde(default)]
    pub tolerance: KindTolerances,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            rebase: false,
            tolerance: KindTolerances::default(),
        }
    }
}

/// Walks up from `start_dir` until a `regtest.toml` or a `.git` folder is found.
pub fn find_project_root(start_dir: impl AsRef<Path>) -> Option<PathBuf> {
    let mut dir = start_dir.as_ref();
    log::debug!("Searching for project root starting from {}", dir.display());

    loop {
        if dir.join(CONFIG_FILE_NAME).exists() || dir.join(".git").exists() {
            log::debug!("Found project root at {}", dir.display());
            return Some(dir.to_path_buf());
        }
        dir = dir.parent()?;
    }
}

/// Interpret the rebase environment variable. `None` when unset or empty.
pub fn parse_rebase_flag(value: Option<&str>) -> Result<Option<bool>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        other => Err(RegressError::config(format!(
            "{REBASE_ENV_VAR} must be a boolean, got '{other}'"
        ))),
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| RegressError::config(format!("Failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, directory: impl AsRef<Path>) -> Result<()> {
        let config_path = directory.as_ref().join(CONFIG_FILE_NAME);
        let content =
            toml::to_string_pretty(&self).map_err(|e| RegressError::serialize(e.to_string()))?;
        fs::write(&config_path, content)?;
        log::info!("Configuration saved to {}", config_path.display());
        Ok(())
    }

    /// Finds the project root from `current_directory` and loads its config file.
    ///
    /// `None` means no config file exists at the project root.
    pub fn find(current_directory: impl AsRef<Path>) -> Option<Result<Self>> {
        let root = find_project_root(current_directory)?;
        let config_path = root.join(CONFIG_FILE_NAME);
        log::debug!("Looking for config at {}", config_path.display());
        if config_path.is_file() {
            Some(Self::load(&config_path))
        } else {
            log::debug!("No config file found at {}", config_path.display());
            None
        }
    }

    /// Apply the `REGTEST_REBASE` environment variable on top of the file value.
    pub fn with_env(mut self) -> Result<Self> {
        let value = std::env::var(REBASE_ENV_VAR).ok();
        if let Some(rebase) = parse_rebase_flag(value.as_deref())? {
            log::debug!("{REBASE_ENV_VAR} overrides rebase={rebase}");
            self.rebase = rebase;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        let KindTolerances { table, array, value } = &self.tolerance;
        for (name, tolerance) in [("table", table), ("array", array), ("value", value)] {
            if let Some(t) = tolerance {
                t.validate(&format!("tolerance.{name}"))
                    .map_err(|e| RegressError::config(e.to_string()))?;
            }
        }
        Ok(())
    }

    pub fn table_tolerance(&self) -> Tolerance {
        self.tolerance.table.unwrap_or(TABLE_DEFAULT_TOLERANCE)
    }

    pub fn array_tolerance(&self) -> Tolerance {
        self.tolerance.array.unwrap_or(ARRAY_DEFAULT_TOLERANCE)
    }

    pub fn value_tolerance(&self) -> Tolerance {
        self.tolerance.value.unwrap_or(VALUE_DEFAULT_TOLERANCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_save_and_find_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut original = Config::default();
        original.rebase = true;
        original.tolerance.array = Some(Tolerance::new(1e-3, 0.0));
        original.save(tmp.path()).unwrap();

        let nested = tmp.path().join("tests").join("deep");
        fs::create_dir_all(&nested).unwrap();
        let loaded = Config::find(&nested).unwrap().unwrap();
        assert_eq!(original, loaded);
        assert_eq!(loaded.array_tolerance(), Tolerance::new(1e-3, 0.0));
        assert_eq!(loaded.table_tolerance(), TABLE_DEFAULT_TOLERANCE);
    }

    #[test]
    fn config_find_returns_none_without_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        assert!(Config::find(tmp.path()).is_none());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn invalid_tolerance_is_a_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[tolerance.table]\natol = -1.0\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.error_type(), "config_error");
    }

    #[test]
    fn malformed_toml_is_a_config_error_naming_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "rebase = [not toml").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert_eq!(err.error_type(), "config_error");
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn rebase_flag_parsing() {
        assert_eq!(parse_rebase_flag(None).unwrap(), None);
        assert_eq!(parse_rebase_flag(Some("")).unwrap(), None);
        assert_eq!(parse_rebase_flag(Some("1")).unwrap(), Some(true));
        assert_eq!(parse_rebase_flag(Some("TRUE")).unwrap(), Some(true));
        assert_eq!(parse_rebase_flag(Some("no")).unwrap(), Some(false));
        assert!(parse_rebase_flag(Some("maybe")).is_err());
    }
}
