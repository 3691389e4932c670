//! Configuration file support for flashtry.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (FLASHTRY_*)
//! 3. Local config file (./flashtry.toml)
//! 4. Global config file (~/.config/flashtry/config.toml)
//! 5. Built-in defaults
//!
//! `--config PATH` replaces layers 3 and 4 with the given file.

use {
    crate::error::CliError,
    directories::{BaseDirs, ProjectDirs},
    flashtry::{FlashCommand, FlashRunner, ScenarioConfig, scenario::DEFAULT_MODEL},
    log::{debug, warn},
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
        time::Duration,
    },
};

/// Local configuration file name.
pub const LOCAL_CONFIG: &str = "flashtry.toml";

/// Build directory used when none is configured, relative to the home directory.
pub const DEFAULT_BUILD_DIR: &str = "~/zephyr-dev/build/h753zi";

/// Log file used when none is configured.
pub const DEFAULT_LOGFILE: &str = "flash_try.log";

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Console device (e.g., "/dev/ttyACM0").
    pub serial: Option<String>,
    /// Console baud rate.
    pub baud: Option<u32>,
    /// Prompt wait in seconds.
    pub prompt_timeout: Option<f64>,
}

/// Flash configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashConfig {
    /// West build directory.
    pub build_dir: Option<String>,
    /// `west flash` runner name.
    pub runner: Option<String>,
    /// Extra OpenOCD commands.
    #[serde(default)]
    pub runner_args: Vec<String>,
    /// `west` program name or path.
    pub west: Option<String>,
    /// Skip flashing by default.
    #[serde(default)]
    pub skip: bool,
}

/// Scenario configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioSection {
    /// Motor model to apply.
    pub model: Option<String>,
    /// Axis the model is applied to.
    pub axis: Option<u8>,
    /// Event log path.
    pub logfile: Option<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Flash configuration.
    #[serde(default)]
    pub flash: FlashConfig,
    /// Scenario configuration.
    #[serde(default)]
    pub scenario: ScenarioSection,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG)) {
            debug!("Loaded local config from {LOCAL_CONFIG}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "flashtry").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        // Connection config
        if other.connection.serial.is_some() {
            self.connection.serial = other.connection.serial;
        }
        if other.connection.baud.is_some() {
            self.connection.baud = other.connection.baud;
        }
        if other.connection.prompt_timeout.is_some() {
            self.connection.prompt_timeout = other.connection.prompt_timeout;
        }

        // Flash config
        if other.flash.build_dir.is_some() {
            self.flash.build_dir = other.flash.build_dir;
        }
        if other.flash.runner.is_some() {
            self.flash.runner = other.flash.runner;
        }
        if !other.flash.runner_args.is_empty() {
            self.flash.runner_args = other.flash.runner_args;
        }
        if other.flash.west.is_some() {
            self.flash.west = other.flash.west;
        }
        if other.flash.skip {
            self.flash.skip = true;
        }

        // Scenario config
        if other.scenario.model.is_some() {
            self.scenario.model = other.scenario.model;
        }
        if other.scenario.axis.is_some() {
            self.scenario.axis = other.scenario.axis;
        }
        if other.scenario.logfile.is_some() {
            self.scenario.logfile = other.scenario.logfile;
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
#[allow(missing_docs)]
pub struct Overrides {
    pub build_dir: Option<PathBuf>,
    pub runner: Option<FlashRunner>,
    /// Replaces the configured runner arguments when non-empty.
    pub runner_args: Vec<String>,
    pub no_flash: bool,
    pub serial: Option<String>,
    pub baud: Option<u32>,
    /// Seconds.
    pub prompt_timeout: Option<f64>,
    pub model: Option<String>,
    pub axis: Option<u8>,
    pub logfile: Option<PathBuf>,
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Scenario to run.
    pub scenario: ScenarioConfig,
    /// Event log path.
    pub logfile: PathBuf,
}

impl Settings {
    /// Layer `overrides` over `config` over the built-in defaults.
    pub fn resolve(overrides: Overrides, config: Config) -> Result<Self, CliError> {
        let runner = match (overrides.runner, config.flash.runner.as_deref()) {
            (Some(runner), _) => runner,
            (None, Some(name)) => FlashRunner::from_name(name).ok_or_else(|| {
                CliError::Usage(format!(
                    "unknown runner '{name}' in config (expected openocd or stlink)"
                ))
            })?,
            (None, None) => FlashRunner::default(),
        };

        let prompt_timeout = overrides
            .prompt_timeout
            .or(config.connection.prompt_timeout);
        let prompt_timeout = match prompt_timeout {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .ok()
                .filter(|timeout| *timeout <= flashtry::MAX_WAIT)
                .ok_or_else(|| {
                    CliError::Usage(format!(
                        "invalid prompt timeout: {secs} (expected 0 to {} seconds)",
                        flashtry::MAX_WAIT.as_secs()
                    ))
                })?,
            None => flashtry::DEFAULT_PROMPT_TIMEOUT,
        };

        let model = overrides
            .model
            .or(config.scenario.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        // The model is spliced into a shell command line
        if model.is_empty() || model.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(CliError::Usage(format!(
                "invalid model {model:?} (expected a single word without control characters)"
            )));
        }

        let flash = if overrides.no_flash || config.flash.skip {
            None
        } else {
            let build_dir = overrides
                .build_dir
                .or_else(|| {
                    config
                        .flash
                        .build_dir
                        .as_deref()
                        .map(expand_home)
                })
                .unwrap_or_else(|| expand_home(DEFAULT_BUILD_DIR));
            let mut command = FlashCommand::new(build_dir, runner);
            command.runner_args = if overrides.runner_args.is_empty() {
                config.flash.runner_args
            } else {
                overrides.runner_args
            };
            if let Some(west) = config.flash.west {
                command.west = west;
            }
            Some(command)
        };

        let defaults = ScenarioConfig::default();
        let scenario = ScenarioConfig {
            flash,
            serial: overrides
                .serial
                .or(config.connection.serial)
                .filter(|s| !s.trim().is_empty()),
            baud: overrides
                .baud
                .or(config.connection.baud)
                .unwrap_or(defaults.baud),
            model,
            axis: overrides
                .axis
                .or(config.scenario.axis)
                .unwrap_or(defaults.axis),
            ..defaults
        }
        .with_prompt_timeout(prompt_timeout);

        let logfile = overrides
            .logfile
            .or_else(|| config.scenario.logfile.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGFILE));

        Ok(Self { scenario, logfile })
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => PathBuf::from(path),
    }
}
