//! `west flash` invocation.

use std::fmt;
use std::path::PathBuf;

/// Program used when none is configured.
pub const DEFAULT_WEST: &str = "west";

/// Supported `west flash` runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlashRunner {
    /// OpenOCD (default). Accepts extra `-c` commands.
    #[default]
    Openocd,
    /// ST-LINK tools.
    Stlink,
}

impl FlashRunner {
    /// Name passed to `west flash -r`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openocd => "openocd",
            Self::Stlink => "stlink",
        }
    }

    /// Parse a runner name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name
            .trim()
            .to_lowercase()
            .as_str()
        {
            "openocd" => Some(Self::Openocd),
            "stlink" => Some(Self::Stlink),
            _ => None,
        }
    }
}

impl fmt::Display for FlashRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to build the flashing command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashCommand {
    /// `west` executable.
    pub west: String,
    /// West build directory.
    pub build_dir: PathBuf,
    /// Flash runner.
    pub runner: FlashRunner,
    /// Extra runner arguments, each passed as an OpenOCD `-c` command.
    pub runner_args: Vec<String>,
}

impl FlashCommand {
    /// Flash `build_dir` with `runner` using the default `west`.
    pub fn new(build_dir: impl Into<PathBuf>, runner: FlashRunner) -> Self {
        Self {
            west: DEFAULT_WEST.to_string(),
            build_dir: build_dir.into(),
            runner,
            runner_args: Vec::new(),
        }
    }

    /// Full argument vector, program first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = vec![
            self.west.clone(),
            "flash".to_string(),
            "--skip-rebuild".to_string(),
            "--build-dir".to_string(),
            self.build_dir
                .display()
                .to_string(),
            "-r".to_string(),
            self.runner
                .as_str()
                .to_string(),
        ];

        match self.runner {
            FlashRunner::Openocd if !self.runner_args.is_empty() => {
                argv.push("--".to_string());
                for arg in &self.runner_args {
                    argv.push("-c".to_string());
                    argv.push(arg.clone());
                }
            },
            FlashRunner::Stlink if !self.runner_args.is_empty() => {
                log::debug!("Ignoring runner arguments for stlink: {:?}", self.runner_args);
            },
            _ => {},
        }

        argv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_names() {
        assert_eq!(FlashRunner::from_name("openocd"), Some(FlashRunner::Openocd));
        assert_eq!(FlashRunner::from_name(" STLink "), Some(FlashRunner::Stlink));
        assert_eq!(FlashRunner::from_name("jlink"), None);
        assert_eq!(FlashRunner::default().to_string(), "openocd");
    }

    #[test]
    fn test_openocd_argv_with_extra_commands() {
        let mut cmd = FlashCommand::new("/tmp/build/h753zi", FlashRunner::Openocd);
        cmd.runner_args = vec!["adapter speed 400".to_string(), "init".to_string()];
        assert_eq!(
            cmd.argv(),
            vec![
                "west",
                "flash",
                "--skip-rebuild",
                "--build-dir",
                "/tmp/build/h753zi",
                "-r",
                "openocd",
                "--",
                "-c",
                "adapter speed 400",
                "-c",
                "init",
            ]
        );
    }

    #[test]
    fn test_openocd_argv_without_extra_commands_has_no_separator() {
        let cmd = FlashCommand::new("build", FlashRunner::Openocd);
        assert!(!cmd.argv().contains(&"--".to_string()));
    }

    #[test]
    fn test_stlink_ignores_runner_args() {
        let mut cmd = FlashCommand::new("build", FlashRunner::Stlink);
        cmd.west = "/opt/zephyr/bin/west".to_string();
        cmd.runner_args = vec!["adapter speed 400".to_string()];
        assert_eq!(
            cmd.argv(),
            vec![
                "/opt/zephyr/bin/west",
                "flash",
                "--skip-rebuild",
                "--build-dir",
                "build",
                "-r",
                "stlink",
            ]
        );
    }
}
