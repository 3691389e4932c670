//! Reboot the device over its shell and resynchronise on the new prompt.
//!
//! The sequence is fixed:
//!
//! 1. Send the primary reboot command with a short probe timeout. The device
//!    normally goes silent at once, so waiting long here only wastes time.
//! 2. If no prompt came back, send the fallback spelling for shells that
//!    only know `reboot`.
//! 3. Sleep through the reset dead zone.
//! 4. Wait for the prompt with the full timeout; if it does not show, log a
//!    warning, pause once more and wait again.
//!
//! A missing prompt never aborts: the commands issued afterwards are what
//! tells whether the device came back.

use {
    crate::{
        port::Channel,
        session::{CommandResult, CommandSession},
        shell,
    },
    log::debug,
    std::{thread, time::Duration},
};

/// Wait on each reboot command before assuming the device is resetting.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Dead time after the reboot commands before polling resumes.
pub const SETTLE: Duration = Duration::from_millis(1500);

/// Extra pause before the single resync retry.
pub const RETRY_PAUSE: Duration = Duration::from_secs(2);

/// Timings and commands of a reboot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootPlan {
    /// Primary reboot command.
    pub primary: String,
    /// Alternate spelling tried when the primary gets no prompt back.
    pub fallback: String,
    /// Wait after each reboot command.
    pub probe_timeout: Duration,
    /// Sleep after the reboot commands.
    pub settle: Duration,
    /// Wait for the prompt on each resync attempt.
    pub resync_timeout: Duration,
    /// Pause between the first and second resync attempt.
    pub retry_pause: Duration,
}

impl RebootPlan {
    /// Default plan resynchronising with `resync_timeout`.
    pub fn new(resync_timeout: Duration) -> Self {
        Self {
            primary: shell::KERNEL_REBOOT.to_string(),
            fallback: shell::REBOOT_FALLBACK.to_string(),
            probe_timeout: PROBE_TIMEOUT,
            settle: SETTLE,
            resync_timeout,
            retry_pause: RETRY_PAUSE,
        }
    }
}

impl Default for RebootPlan {
    fn default() -> Self {
        Self::new(crate::session::DEFAULT_PROMPT_TIMEOUT)
    }
}

/// How resynchronisation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resync {
    /// Prompt seen on the first wait.
    Prompt,
    /// Prompt seen only after the retry.
    PromptAfterRetry,
    /// No prompt on either wait; the scenario continues regardless.
    NoPrompt,
}

impl Resync {
    /// Whether the prompt was seen at all.
    pub fn prompt_seen(&self) -> bool {
        !matches!(self, Self::NoPrompt)
    }
}

/// Record of one reboot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootReport {
    /// Primary reboot command.
    pub primary: CommandResult,
    /// Fallback command, when it was sent.
    pub fallback: Option<CommandResult>,
    /// Resynchronisation result.
    pub resync: Resync,
}

/// Runs a [`RebootPlan`] against a session.
#[derive(Debug, Clone)]
pub struct RebootRecovery {
    plan: RebootPlan,
}

impl RebootRecovery {
    /// Create a recovery for `plan`.
    pub fn new(plan: RebootPlan) -> Self {
        Self { plan }
    }

    /// Issue the reboot and resynchronise. Always returns.
    pub fn reboot<C: Channel>(&self, session: &mut CommandSession<C>) -> RebootReport {
        let plan = &self.plan;

        let primary = session.send_cmd(&plan.primary, plan.probe_timeout);
        let fallback = if primary.prompt_detected {
            debug!("'{}' answered with a prompt; skipping fallback", plan.primary);
            None
        } else {
            Some(session.send_cmd(&plan.fallback, plan.probe_timeout))
        };

        debug!("Waiting {:?} for the device to reset", plan.settle);
        thread::sleep(plan.settle);

        let resync = if session.wait_for_prompt(plan.resync_timeout) {
            Resync::Prompt
        } else {
            session
                .log()
                .warn("No prompt after reboot; waiting a bit more");
            thread::sleep(plan.retry_pause);
            if session.wait_for_prompt(plan.resync_timeout) {
                Resync::PromptAfterRetry
            } else {
                session
                    .log()
                    .warn("Still no prompt after reboot; continuing");
                Resync::NoPrompt
            }
        };

        RebootReport {
            primary,
            fallback,
            resync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::{EventLog, MemorySink};
    use crate::port::mock::{Reply, ScriptedChannel};
    use crate::session::SessionTiming;
    use std::time::Instant;

    fn fast_plan() -> RebootPlan {
        RebootPlan {
            probe_timeout: Duration::from_millis(40),
            settle: Duration::from_millis(10),
            resync_timeout: Duration::from_millis(100),
            retry_pause: Duration::from_millis(10),
            ..RebootPlan::default()
        }
    }

    fn session(channel: ScriptedChannel) -> (CommandSession<ScriptedChannel>, MemorySink) {
        let sink = MemorySink::new();
        let timing = SessionTiming {
            poll_interval: Duration::from_millis(2),
            ..SessionTiming::default()
        };
        let log = EventLog::new(sink.clone(), false);
        (CommandSession::new(channel, log, timing), sink)
    }

    #[test]
    fn test_default_plan_commands_and_timings() {
        let plan = RebootPlan::new(Duration::from_secs(8));
        assert_eq!(plan.primary, "kernel reboot");
        assert_eq!(plan.fallback, "reboot");
        assert_eq!(plan.probe_timeout, Duration::from_secs(1));
        assert_eq!(plan.settle, Duration::from_millis(1500));
        assert_eq!(plan.retry_pause, Duration::from_secs(2));
        assert_eq!(plan.resync_timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_reboot_sends_fallback_and_resyncs() {
        let mut channel = ScriptedChannel::new("/dev/ttyACM0");
        channel.on_command(
            "kernel reboot",
            vec![Reply::after(
                Duration::from_millis(200),
                "*** Booting Zephyr OS build v4.2.0 ***\r\nuart:~$ ",
            )],
        );
        let mut plan = fast_plan();
        plan.resync_timeout = Duration::from_secs(2);
        let (mut session, sink) = session(channel);

        let report = RebootRecovery::new(plan).reboot(&mut session);

        assert!(!report.primary.prompt_detected);
        assert_eq!(
            report
                .fallback
                .as_ref()
                .map(|r| r.command.as_str()),
            Some("reboot")
        );
        assert_eq!(report.resync, Resync::Prompt);

        let cmds: Vec<String> = sink
            .entries()
            .into_iter()
            .filter(|(tag, _)| tag == "CMD")
            .map(|(_, text)| text)
            .collect();
        assert_eq!(cmds, vec!["kernel reboot", "reboot"]);
    }

    #[test]
    fn test_prompt_after_primary_skips_fallback() {
        let mut channel = ScriptedChannel::new("/dev/ttyACM0");
        channel.on_command("kernel reboot", vec![Reply::now("kernel reboot\r\nuart:~$ ")]);
        channel.push("uart:~$ ");
        let (mut session, _sink) = session(channel);

        let report = RebootRecovery::new(fast_plan()).reboot(&mut session);
        assert!(report.primary.prompt_detected);
        assert!(report.fallback.is_none());
    }

    #[test]
    fn test_silent_device_returns_with_warnings() {
        let channel = ScriptedChannel::new("/dev/ttyACM0");
        let (mut session, sink) = session(channel);

        let started = Instant::now();
        let report = RebootRecovery::new(fast_plan()).reboot(&mut session);

        assert_eq!(report.resync, Resync::NoPrompt);
        assert!(!report.resync.prompt_seen());
        assert!(started.elapsed() < Duration::from_secs(5));
        let warns = sink
            .entries()
            .into_iter()
            .filter(|(tag, _)| tag == "WARN")
            .count();
        assert!(warns >= 1);
    }

    #[test]
    fn test_prompt_on_retry() {
        let mut channel = ScriptedChannel::new("/dev/ttyACM0");
        // 40 + 40 probes, 10 settle, 100 first wait: the prompt lands during the pause
        channel.on_command(
            "kernel reboot",
            vec![Reply::after(Duration::from_millis(300), "uart:~$ ")],
        );
        let (mut session, _sink) = session(channel);

        let mut plan = fast_plan();
        plan.retry_pause = Duration::from_millis(200);
        let report = RebootRecovery::new(plan).reboot(&mut session);
        assert_eq!(report.resync, Resync::PromptAfterRetry);
    }
}
