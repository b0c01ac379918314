//! # vposix-config
//!
//! Configuration management for vposix.
//!
//! Loads configuration from:
//! 1. `~/.vposix/config.toml` (global)
//! 2. `.vposix/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod testing;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;
use tracing::{debug, warn};

/// Global config instance
static CONFIG: Lazy<RwLock<Config>> =
    Lazy::new(|| RwLock::new(Config::load().unwrap_or_default()));

/// Get global config (read-only)
pub fn config() -> std::sync::RwLockReadGuard<'static, Config> {
    CONFIG.read().unwrap_or_else(|e| e.into_inner())
}

/// Reload config from disk
pub fn reload() -> Result<(), ConfigError> {
    let new_config = Config::load()?;
    *CONFIG.write().unwrap_or_else(|e| e.into_inner()) = new_config;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub strategy: StrategyConfig,
    pub fallback: FallbackConfig,
    pub tty: TtyConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // 1. Global config (~/.vposix/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::from_file(&global_path)?;
            }
        }

        // 2. Project config (.vposix/config.toml) - overrides global
        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from {:?}", project_path);
            config.merge(Self::from_file(&project_path)?);
        }

        // 3. Environment variable overrides
        config.apply_env_overrides();

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Global config path: ~/.vposix/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".vposix/config.toml"))
    }

    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".vposix/config.toml")
    }

    /// Merge a project config: every value that differs from the default wins.
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.strategy.mode != defaults.strategy.mode {
            self.strategy.mode = other.strategy.mode;
        }
        if other.tty.probe != defaults.tty.probe {
            self.tty.probe = other.tty.probe;
        }
        self.fallback.merge(other.fallback, &defaults.fallback);
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("VPOSIX_STRATEGY") {
            match value.parse() {
                Ok(mode) => self.strategy.mode = mode,
                Err(e) => warn!("Ignoring VPOSIX_STRATEGY: {}", e),
            }
        }
        if let Some(value) = lookup("VPOSIX_TTY") {
            match value.parse() {
                Ok(probe) => self.tty.probe = probe,
                Err(e) => warn!("Ignoring VPOSIX_TTY: {}", e),
            }
        }
        if let Some(value) = lookup("VPOSIX_MKDIR") {
            match value.parse() {
                Ok(mkdir) => self.fallback.mkdir = mkdir,
                Err(e) => warn!("Ignoring VPOSIX_MKDIR: {}", e),
            }
        }
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// How each operation is bound at facade construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// Native where the platform supports it, fallback elsewhere
    #[default]
    Auto,
    Native,
    Fallback,
}

impl FromStr for StrategyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(StrategyMode::Auto),
            "native" => Ok(StrategyMode::Native),
            "fallback" => Ok(StrategyMode::Fallback),
            _ => Err(ConfigError::InvalidValue {
                key: "strategy.mode",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub mode: StrategyMode,
}

/// How the fallback strategy creates directories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirCreation {
    #[default]
    Direct,
    Exec,
}

impl FromStr for DirCreation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(DirCreation::Direct),
            "exec" => Ok(DirCreation::Exec),
            _ => Err(ConfigError::InvalidValue {
                key: "fallback.mkdir",
                value: s.to_string(),
            }),
        }
    }
}

/// External utilities used by the fallback strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub ln: String,
    pub chown: String,
    pub chgrp: String,
    pub readlink: String,
    pub mkdir_program: String,
    pub id: String,
    pub mkdir: DirCreation,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            ln: "ln".to_string(),
            chown: "chown".to_string(),
            chgrp: "chgrp".to_string(),
            readlink: "readlink".to_string(),
            mkdir_program: "mkdir".to_string(),
            id: "id".to_string(),
            mkdir: DirCreation::Direct,
        }
    }
}

impl FallbackConfig {
    fn merge(&mut self, other: FallbackConfig, defaults: &FallbackConfig) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field != defaults.$field {
                    self.$field = other.$field;
                })*
            };
        }
        take!(ln, chown, chgrp, readlink, mkdir_program, id, mkdir);
    }
}

/// `isatty` probing policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtyProbe {
    /// Descriptors 0, 1 and 2 are terminals, nothing else is
    #[default]
    Static,
    /// Ask the OS
    Os,
}

impl FromStr for TtyProbe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(TtyProbe::Static),
            "os" => Ok(TtyProbe::Os),
            _ => Err(ConfigError::InvalidValue {
                key: "tty.probe",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtyConfig {
    pub probe: TtyProbe,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.strategy.mode, StrategyMode::Auto);
        assert_eq!(config.tty.probe, TtyProbe::Static);
        assert_eq!(config.fallback.chgrp, "chgrp");
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(toml_str.contains("[strategy]"));
        assert!(toml_str.contains("[fallback]"));
        assert!(toml_str.contains("[tty]"));
        assert!(toml_str.contains("mode = \"auto\""));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let parsed: Config = toml::from_str("[strategy]\nmode = \"fallback\"\n").unwrap();
        assert_eq!(parsed.strategy.mode, StrategyMode::Fallback);
        assert_eq!(parsed.fallback.ln, "ln");
    }

    #[test]
    fn test_merge_project_over_global() {
        let mut global = Config::default();
        global.tty.probe = TtyProbe::Os;
        global.fallback.readlink = "greadlink".to_string();

        let mut project = Config::default();
        project.strategy.mode = StrategyMode::Native;
        project.fallback.chown = "/usr/bin/chown".to_string();

        global.merge(project);
        assert_eq!(global.strategy.mode, StrategyMode::Native);
        assert_eq!(global.tty.probe, TtyProbe::Os);
        assert_eq!(global.fallback.readlink, "greadlink");
        assert_eq!(global.fallback.chown, "/usr/bin/chown");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("VPOSIX_STRATEGY", "Fallback"),
            ("VPOSIX_TTY", "bogus"),
            ("VPOSIX_MKDIR", "exec"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.strategy.mode, StrategyMode::Fallback);
        assert_eq!(config.tty.probe, TtyProbe::Static);
        assert_eq!(config.fallback.mkdir, DirCreation::Exec);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tty]\nprobe = \"os\"\n").unwrap();
        assert_eq!(Config::from_file(&path).unwrap().tty.probe, TtyProbe::Os);

        std::fs::write(&path, "[tty]\nprobe = 3\n").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Toml(_))));
    }
}
