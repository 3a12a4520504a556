//! Application configuration, stored as YAML in the skyfuel home directory.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::{DEFAULT_SIZE, MAX_SIZE, MIN_SIZE};
use crate::error::{Result, SkyfuelError};

/// Environment variable that overrides the home directory.
pub const HOME_ENV: &str = "SKYFUEL_HOME";

/// Home directory name used when `SKYFUEL_HOME` is unset, relative to the current directory.
pub const DEFAULT_HOME_DIR: &str = ".skyfuel";

pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite database file; relative paths are resolved against the home directory.
    pub database: PathBuf,
    /// Where QR code images are written; relative to the home directory unless absolute.
    pub pictures_dir: PathBuf,
    /// Edge length of QR code images, in pixels. Must lie in `MIN_SIZE..=MAX_SIZE`.
    pub qr_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("skyfuel.sqlite"),
            pictures_dir: PathBuf::from("pictures"),
            qr_size: DEFAULT_SIZE,
        }
    }
}

impl AppConfig {
    /// Load `<home>/config.yaml`, falling back to defaults when the file is absent.
    pub fn load(home: &Path) -> Result<Self> {
        let path = home.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)?;
        let config: AppConfig = serde_yaml::from_str(&text)
            .map_err(|e| SkyfuelError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Write this configuration to `<home>/config.yaml`.
    pub fn save(&self, home: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| SkyfuelError::Config(format!("YAML serialization failed: {}", e)))?;
        fs::create_dir_all(home)?;
        fs::write(home.join(CONFIG_FILE), yaml)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&self.qr_size) {
            return Err(SkyfuelError::Config(format!(
                "qr_size must be between {} and {}, got {}",
                MIN_SIZE, MAX_SIZE, self.qr_size
            )));
        }
        if self.database.as_os_str().is_empty() {
            return Err(SkyfuelError::Config("database path is empty".to_string()));
        }
        Ok(())
    }

    pub fn database_path(&self, home: &Path) -> PathBuf {
        resolve(home, &self.database)
    }

    pub fn pictures_path(&self, home: &Path) -> PathBuf {
        resolve(home, &self.pictures_dir)
    }
}

fn resolve(home: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(path)
    }
}

/// The skyfuel home: `$SKYFUEL_HOME` if set, else `./.skyfuel`.
pub fn home_dir() -> PathBuf {
    match env::var_os(HOME_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_HOME_DIR),
    }
}
