use std::path::Path;
use std::sync::RwLock;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::consts::{CHANGE_CONFIGURATION, PACKAGE_SERVICE, PERMISSION_SERVICE};
use crate::err;
use crate::plat::transact::TransactionEntry;

lazy_static::lazy_static! {
    pub static ref CONFIG: RwLock<Config> = RwLock::new(init_config(CONFIG_PATH));
}

#[cfg(target_os = "android")]
pub const CONFIG_PATH: &str = "/data/adb/pmshim/config.toml";

#[cfg(not(target_os = "android"))]
pub const CONFIG_PATH: &str = "./pmshim/config.toml";

/// Loads the config at `path`, falling back to defaults when it is missing or
/// malformed, and writes the effective config back so the file always exists.
pub fn init_config(path: impl AsRef<Path>) -> Config {
    let path = path.as_ref();
    let config = match load(path) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("Using default config: {:?}", e);
            Config::default()
        }
    };

    if let Err(e) = store(path, &config) {
        log::error!("Failed to write config file: {:?}", e);
    }

    config
}

/// Reads and parses a config file.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| err!("Failed to read {}", path.display()))?;
    toml::from_str(&s).with_context(|| err!("Failed to parse {}", path.display()))
}

fn store(path: &Path, config: &Config) -> anyhow::Result<()> {
    let s = toml::to_string_pretty(config).context(err!())?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context(err!("Failed to create config directory"))?;
    }
    std::fs::write(path, s).with_context(|| err!("Failed to write {}", path.display()))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub grant: GrantConfig,
    pub service: ServiceConfig,
    /// Platform transaction codes per SDK level, as `[[transactions]]` tables.
    pub transactions: Vec<TransactionEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GrantMethod {
    /// Talk to the permission or package manager service directly.
    #[default]
    Binder,
    /// Run `pm grant` directly. Needs the shell or root uid already.
    Shell,
    /// Run `pm grant` through `su -c`, for callers running as an app uid.
    Root,
}

impl std::fmt::Display for GrantMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrantMethod::Binder => write!(f, "binder"),
            GrantMethod::Shell => write!(f, "shell"),
            GrantMethod::Root => write!(f, "root"),
        }
    }
}

impl std::str::FromStr for GrantMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binder" => Ok(GrantMethod::Binder),
            "shell" => Ok(GrantMethod::Shell),
            "root" => Ok(GrantMethod::Root),
            other => Err(format!("unknown grant method `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GrantConfig {
    pub method: GrantMethod,
    /// Permission granted when none is given explicitly.
    pub permission: String,
    /// Program used by the shell and root methods.
    pub shell_program: String,
    /// `su` binary used by the root method.
    pub su_program: String,
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            method: GrantMethod::Binder,
            permission: CHANGE_CONFIGURATION.to_string(),
            shell_program: "pm".to_string(),
            su_program: "su".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    pub package_service: String,
    pub permission_service: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            package_service: PACKAGE_SERVICE.to_string(),
            permission_service: PERMISSION_SERVICE.to_string(),
        }
    }
}
