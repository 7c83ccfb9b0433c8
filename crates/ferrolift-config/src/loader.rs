//! Configuration loader utilities

use crate::{Config, ConfigBuilder, ConfigError, ConfigResult};
use std::path::{Path, PathBuf};

/// Environment prefix for configuration overrides
pub const ENV_PREFIX: &str = "FERROLIFT";

/// File name looked up next to the executable
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Configuration loader with common loading patterns
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load `config.yaml` from the directory of the running executable
    pub fn load_default() -> ConfigResult<Config> {
        Self::load_from_file(Self::default_config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::Unreadable {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Configuration file not found",
                ),
            });
        }

        ConfigBuilder::new()
            .add_source_file(path)
            .add_env_prefix(ENV_PREFIX)
            .build()
            .map_err(|e| match e {
                ConfigError::Layering { message } => ConfigError::Malformed {
                    path: path.to_path_buf(),
                    message,
                },
                other => other,
            })
    }

    /// Directory holding the running executable
    pub fn executable_dir() -> ConfigResult<PathBuf> {
        let exe = std::env::current_exe().map_err(|e| ConfigError::ExecutableDir {
            message: e.to_string(),
        })?;
        exe.parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ConfigError::ExecutableDir {
                message: format!("'{}' has no parent directory", exe.display()),
            })
    }

    /// `config.yaml` next to the executable
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        Ok(Self::executable_dir()?.join(DEFAULT_CONFIG_FILE))
    }

    /// Serialize a configuration to YAML
    pub fn to_yaml(config: &Config) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(config)?)
    }
}
