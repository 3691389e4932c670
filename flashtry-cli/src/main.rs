//! flashtry CLI - flash a Zephyr board and check its settings survive a reboot.
//!
//! ## Features
//!
//! - Flash through `west flash` (OpenOCD or ST-LINK runner)
//! - Auto-detect the shell console among the usual USB serial nodes
//! - Apply a motor model, dump persisted settings, reboot, verify and dump again
//! - Timestamped log of every command, response line and tool output
//! - Config file and environment variable support

use {
    anyhow::Result,
    clap::{Parser, ValueEnum},
    console::style,
    env_logger::Env,
    flashtry::{EventLog, FlashRunner, NativeConnector, Scenario, ScenarioReport, Stage, SubprocessRunner},
    log::debug,
    std::{env, path::PathBuf},
};

mod config;
mod error;

use {
    config::{Config, Overrides, Settings},
    error::{CliError, exit_code_for},
};

/// flashtry - flash a board, drive its shell and check settings survive a reboot.
///
/// Environment variables:
///   FLASHTRY_SERIAL     - Serial device for the shell console
///   FLASHTRY_BAUD       - Console baud rate (default: 115200)
///   FLASHTRY_BUILD_DIR  - West build directory
///   FLASHTRY_RUNNER     - West flash runner (openocd, stlink)
#[derive(Parser, Debug)]
#[command(name = "flashtry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the west build directory [default: ~/zephyr-dev/build/h753zi].
    #[arg(long, value_name = "DIR", env = "FLASHTRY_BUILD_DIR")]
    build_dir: Option<PathBuf>,

    /// West flash runner [default: openocd].
    #[arg(long, env = "FLASHTRY_RUNNER")]
    runner: Option<Runner>,

    /// Extra -c command for openocd, e.g. "adapter speed 400" (repeatable).
    #[arg(long = "openocd-arg", value_name = "ARG")]
    openocd_args: Vec<String>,

    /// Skip flashing; only run the shell steps.
    #[arg(long)]
    no_flash: bool,

    /// Serial device for the shell console (auto-detected if not specified).
    #[arg(short, long, env = "FLASHTRY_SERIAL")]
    serial: Option<String>,

    /// Console baud rate [default: 115200].
    #[arg(short, long, env = "FLASHTRY_BAUD")]
    baud: Option<u32>,

    /// Seconds to wait for the shell prompt after connect, commands and reboot [default: 8].
    #[arg(long, value_name = "SECS")]
    prompt_timeout: Option<f64>,

    /// Motor model to set for the check [default: 17HS3001-20B].
    #[arg(long)]
    model: Option<String>,

    /// Axis the model is applied to [default: 0].
    #[arg(long)]
    axis: Option<u8>,

    /// Path of the combined log [default: flash_try.log].
    #[arg(long, value_name = "PATH")]
    logfile: Option<PathBuf>,

    /// Path to a configuration file.
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (no log echo, warnings only).
    #[arg(short, long)]
    quiet: bool,
}

/// Supported west flash runners.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Runner {
    /// OpenOCD (default).
    Openocd,
    /// ST-LINK tools.
    Stlink,
}

impl From<Runner> for FlashRunner {
    fn from(runner: Runner) -> Self {
        match runner {
            Runner::Openocd => FlashRunner::Openocd,
            Runner::Stlink => FlashRunner::Stlink,
        }
    }
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            build_dir: self.build_dir.clone(),
            runner: self.runner.map(Into::into),
            runner_args: self.openocd_args.clone(),
            no_flash: self.no_flash,
            serial: self.serial.clone(),
            baud: self.baud,
            prompt_timeout: self.prompt_timeout,
            model: self.model.clone(),
            axis: self.axis,
            logfile: self.logfile.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if env::var("NO_COLOR").is_ok() || !console::Term::stderr().is_term() {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "flashtry v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            std::process::exit(exit_code_for(&e));
        },
    }
}

/// Resolve settings, run the scenario and report. Returns the exit code.
fn run(cli: &Cli) -> Result<i32> {
    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };
    let settings = Settings::resolve(cli.overrides(), config)?;
    debug!("Settings: {settings:?}");

    let log = EventLog::create(&settings.logfile, !cli.quiet).map_err(|source| CliError::LogFile {
        path: settings.logfile.clone(),
        source,
    })?;

    let mut runner = SubprocessRunner::new(log.clone());
    let mut connector = NativeConnector;
    let report = Scenario::new(settings.scenario, log).run(&mut runner, &mut connector);

    if !cli.quiet {
        print_summary(&report, &settings.logfile);
    }
    Ok(report.exit_code())
}

fn print_summary(report: &ScenarioReport, logfile: &std::path::Path) {
    eprintln!();
    match report.stage {
        Stage::Done => {
            let unanswered: Vec<&str> = report
                .unanswered()
                .map(|c| c.command.as_str())
                .collect();
            eprintln!(
                "{} Sequence completed on {}",
                style("✓").green().bold(),
                style(report.device.as_deref().unwrap_or("?")).cyan()
            );
            if let Some(rc) = report.flash_rc.filter(|rc| *rc != 0) {
                eprintln!("  {} west flash exited with {rc}", style("!").yellow());
            }
            if !unanswered.is_empty() {
                eprintln!(
                    "  {} No prompt after: {}",
                    style("!").yellow(),
                    unanswered.join(", ")
                );
            }
            if report
                .reboot
                .as_ref()
                .is_some_and(|r| !r.resync.prompt_seen())
            {
                eprintln!("  {} Shell did not come back after reboot", style("!").yellow());
            }
        },
        stage => {
            eprintln!(
                "{} Sequence stopped at {stage}: no serial device",
                style("✗").red().bold()
            );
        },
    }
    eprintln!("  Log: {}", style(logfile.display()).dim());
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults_are_unset() {
        let cli = Cli::try_parse_from(["flashtry"]).unwrap();
        assert!(cli.build_dir.is_none());
        assert!(cli.runner.is_none());
        assert!(cli.openocd_args.is_empty());
        assert!(!cli.no_flash);
        assert!(cli.model.is_none());
        assert!(cli.prompt_timeout.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_parse_all_options() {
        let cli = Cli::try_parse_from([
            "flashtry",
            "--build-dir",
            "/work/build",
            "--runner",
            "stlink",
            "--openocd-arg",
            "adapter speed 400",
            "--openocd-arg",
            "init",
            "--no-flash",
            "--serial",
            "/dev/ttyACM1",
            "--baud",
            "230400",
            "--prompt-timeout",
            "2.5",
            "--model",
            "17HS3001-20B",
            "--axis",
            "1",
            "--logfile",
            "run.log",
            "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.runner, Some(Runner::Stlink)));
        assert_eq!(cli.openocd_args, vec!["adapter speed 400", "init"]);
        assert_eq!(cli.serial.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(cli.baud, Some(230_400));
        assert_eq!(cli.prompt_timeout, Some(2.5));
        assert_eq!(cli.axis, Some(1));
        assert_eq!(cli.verbose, 2);

        let overrides = cli.overrides();
        assert_eq!(overrides.runner, Some(FlashRunner::Stlink));
        assert!(overrides.no_flash);
        assert_eq!(overrides.logfile, Some(PathBuf::from("run.log")));
    }

    #[test]
    fn test_cli_invalid_runner() {
        assert!(Cli::try_parse_from(["flashtry", "--runner", "jlink"]).is_err());
    }

    #[test]
    fn test_cli_invalid_baud() {
        assert!(Cli::try_parse_from(["flashtry", "--baud", "fast"]).is_err());
    }

    #[test]
    fn test_runner_to_flash_runner() {
        assert_eq!(FlashRunner::from(Runner::Openocd), FlashRunner::Openocd);
        assert_eq!(FlashRunner::from(Runner::Stlink), FlashRunner::Stlink);
    }
}
