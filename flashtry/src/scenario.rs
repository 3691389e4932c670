//! The flash, configure, reboot and re-verify scenario.
//!
//! Stages run strictly in order, each once the previous one has completed
//! (not necessarily succeeded):
//!
//! ```text
//! FLASH -> CONNECT -> SMOKE -> CONFIGURE -> DUMP_BEFORE -> REBOOT -> RESYNC
//!       -> VERIFY -> DUMP_AFTER -> DONE
//!              \
//!               +-> FAILED   (no serial device, or it cannot be opened)
//! ```
//!
//! Only CONNECT can fail the run. Every other problem is logged and the
//! scenario keeps going, because the commands issued afterwards are the
//! evidence the run exists to collect. The harness records the before and
//! after dumps; comparing them is left to whoever reads the log.

use {
    crate::{
        device::{DEFAULT_CANDIDATES, resolve_device},
        error::{Error, Result},
        event_log::{EventLog, Tag},
        flash::FlashCommand,
        host,
        port::{Channel, Connector, DEFAULT_BAUD, SerialConfig},
        reboot::{RebootPlan, RebootRecovery, RebootReport},
        runner::ProcessRunner,
        session::{CommandResult, CommandSession, SessionTiming},
        shell,
    },
    log::{debug, info},
    std::{fmt, time::Duration},
};

/// Exit code of a completed run, warnings included.
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when no serial device could be reached.
pub const EXIT_NO_DEVICE: i32 = 2;

/// Motor model applied when none is configured.
pub const DEFAULT_MODEL: &str = "17HS3001-20B";

/// Scenario stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Program the firmware.
    Flash,
    /// Resolve and open the console.
    Connect,
    /// Kernel diagnostics and the persistence self-test.
    Smoke,
    /// Apply the motor model.
    Configure,
    /// Dump settings before the reboot.
    DumpBefore,
    /// Issue the reboot.
    Reboot,
    /// Wait for the shell to come back.
    Resync,
    /// Show the model after the reboot.
    Verify,
    /// Dump settings after the reboot.
    DumpAfter,
    /// Scenario completed.
    Done,
    /// Console unreachable.
    Failed,
}

impl Stage {
    /// Upper-case stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "FLASH",
            Self::Connect => "CONNECT",
            Self::Smoke => "SMOKE",
            Self::Configure => "CONFIGURE",
            Self::DumpBefore => "DUMP_BEFORE",
            Self::Reboot => "REBOOT",
            Self::Resync => "RESYNC",
            Self::Verify => "VERIFY",
            Self::DumpAfter => "DUMP_AFTER",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scenario settings.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Flashing step; `None` skips it.
    pub flash: Option<FlashCommand>,
    /// Explicit console device.
    pub serial: Option<String>,
    /// Device nodes tried, in order, when `serial` is not set.
    pub candidates: Vec<String>,
    /// Console baud rate.
    pub baud: u32,
    /// Motor model to apply.
    pub model: String,
    /// Axis the model is applied to.
    pub axis: u8,
    /// Session timing; its default timeout applies to every command.
    pub timing: SessionTiming,
    /// Reboot timing.
    pub reboot: RebootPlan,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            flash: None,
            serial: None,
            candidates: DEFAULT_CANDIDATES
                .iter()
                .map(ToString::to_string)
                .collect(),
            baud: DEFAULT_BAUD,
            model: DEFAULT_MODEL.to_string(),
            axis: 0,
            timing: SessionTiming::default(),
            reboot: RebootPlan::default(),
        }
    }
}

impl ScenarioConfig {
    /// Use `timeout` for every prompt wait, including reboot resync.
    #[must_use]
    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.timing.default_timeout = timeout;
        self.reboot.resync_timeout = timeout;
        self
    }

    /// Prompt timeout in effect.
    pub fn prompt_timeout(&self) -> Duration {
        self.timing.default_timeout
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Terminal stage: [`Stage::Done`] or [`Stage::Failed`].
    pub stage: Stage,
    /// Exit code of the flashing tool, when it ran.
    pub flash_rc: Option<i32>,
    /// Console device used.
    pub device: Option<String>,
    /// Whether the initial prompt was seen after connecting.
    pub connect_prompt: bool,
    /// Every shell command, in issue order (reboot commands included).
    pub commands: Vec<CommandResult>,
    /// Reboot record, when the run got that far.
    pub reboot: Option<RebootReport>,
}

impl ScenarioReport {
    fn new() -> Self {
        Self {
            stage: Stage::Flash,
            flash_rc: None,
            device: None,
            connect_prompt: false,
            commands: Vec::new(),
            reboot: None,
        }
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        if self.stage == Stage::Failed {
            EXIT_NO_DEVICE
        } else {
            EXIT_SUCCESS
        }
    }

    /// Commands that did not get a prompt back.
    pub fn unanswered(&self) -> impl Iterator<Item = &CommandResult> {
        self.commands
            .iter()
            .filter(|c| !c.prompt_detected)
    }
}

/// Drives one run against one device.
pub struct Scenario {
    config: ScenarioConfig,
    log: EventLog,
}

impl Scenario {
    /// Create a scenario logging to `log`.
    pub fn new(config: ScenarioConfig, log: EventLog) -> Self {
        Self { config, log }
    }

    /// Run every stage. Only an unreachable console ends it early.
    pub fn run<R, K>(&self, runner: &mut R, connector: &mut K) -> ScenarioReport
    where
        R: ProcessRunner + ?Sized,
        K: Connector,
    {
        let mut report = ScenarioReport::new();
        self.log.info("Flash+Try starting");

        self.enter(&mut report, Stage::Flash);
        report.flash_rc = self.flash(runner);

        self.enter(&mut report, Stage::Connect);
        let mut session = match self.connect(connector, &mut report) {
            Ok(session) => session,
            Err(e) => {
                self.connect_failure(&e, report.device.as_deref());
                self.enter(&mut report, Stage::Failed);
                return report;
            },
        };

        let cfg = &self.config;

        self.enter(&mut report, Stage::Smoke);
        for command in [shell::KERNEL_STACKS, shell::KERNEL_THREADS, shell::PERSIST_SMOKE] {
            report
                .commands
                .push(self.issue(&mut session, command));
        }

        self.enter(&mut report, Stage::Configure);
        let set = shell::model_set(cfg.axis, &cfg.model);
        report
            .commands
            .push(self.issue(&mut session, &set));

        self.enter(&mut report, Stage::DumpBefore);
        report
            .commands
            .push(self.issue(&mut session, shell::PERSIST_DUMP));

        self.enter(&mut report, Stage::Reboot);
        let reboot = RebootRecovery::new(cfg.reboot.clone()).reboot(&mut session);
        report
            .commands
            .push(reboot.primary.clone());
        if let Some(fallback) = &reboot.fallback {
            report
                .commands
                .push(fallback.clone());
        }
        // Resync already ran inside the recovery; the stage marks its result
        self.enter(&mut report, Stage::Resync);
        debug!("Resync outcome: {:?}", reboot.resync);
        report.reboot = Some(reboot);

        self.enter(&mut report, Stage::Verify);
        let show = shell::model_show(cfg.axis);
        report
            .commands
            .push(self.issue(&mut session, &show));

        self.enter(&mut report, Stage::DumpAfter);
        report
            .commands
            .push(self.issue(&mut session, shell::PERSIST_DUMP));

        session.close();
        self.enter(&mut report, Stage::Done);
        self.log
            .record(Tag::Success, "Flash+Try sequence completed");
        report
    }

    fn enter(&self, report: &mut ScenarioReport, stage: Stage) {
        debug!("Stage {} -> {stage}", report.stage);
        report.stage = stage;
    }

    fn flash<R>(&self, runner: &mut R) -> Option<i32>
    where
        R: ProcessRunner + ?Sized,
    {
        let Some(flash) = &self.config.flash else {
            self.log
                .info("Skipping flash per --no-flash");
            return None;
        };

        info!("Flashing {} with {}", flash.build_dir.display(), flash.runner);
        match runner.run(&flash.argv(), None) {
            Ok(0) => Some(0),
            Ok(rc) => {
                // Some OpenOCD versions exit non-zero after the reset even when programming succeeded
                self.log
                    .warn("west flash returned non-zero; continuing to serial anyway");
                Some(rc)
            },
            Err(e) => {
                self.log
                    .error(&format!("Flashing failed to start: {e}"));
                self.log
                    .warn("Flashing did not run; continuing to serial anyway");
                None
            },
        }
    }

    /// Resolve, open and sync with the console. Every error is fatal.
    fn connect<K: Connector>(
        &self,
        connector: &mut K,
        report: &mut ScenarioReport,
    ) -> Result<CommandSession<K::Channel>> {
        let cfg = &self.config;
        let support = host::serial_support()?;
        debug!("Host serial ports: {:?}", support.ports);

        let device = resolve_device(cfg.serial.as_deref(), &cfg.candidates, |p| {
            connector.exists(p)
        })
        .ok_or(Error::DeviceNotFound)?;
        report.device = Some(device.clone());

        self.log
            .info(&format!("Opening serial {device} @ {}", cfg.baud));
        let serial = SerialConfig::new(device.as_str(), cfg.baud);
        let mut session =
            CommandSession::open(connector, &serial, self.log.clone(), cfg.timing.clone())?;

        report.connect_prompt =
            session.prompt_seen_while_draining() || session.wait_for_prompt(cfg.prompt_timeout());
        if !report.connect_prompt {
            self.log
                .warn("No prompt detected after connect; continuing");
        }

        Ok(session)
    }

    fn connect_failure(&self, error: &Error, device: Option<&str>) {
        let message = match (error, device) {
            (Error::DeviceNotFound, _) => {
                "Could not auto-detect serial device. Use --serial /dev/ttyACM0".to_string()
            },
            (Error::Connection { path, reason }, _) => format!("Failed to open {path}: {reason}"),
            (other, Some(device)) => format!("Failed to open {device}: {other}"),
            (other, None) => other.to_string(),
        };
        self.log
            .error(&message);
    }

    fn issue<C: Channel>(
        &self,
        session: &mut CommandSession<C>,
        command: &str,
    ) -> CommandResult {
        let result = session.send(command);
        if !result.prompt_detected {
            self.log
                .warn(&format!("No prompt after '{command}'; continuing"));
        }
        result
    }
}
