//! Device shell command vocabulary used by the scenario.

/// Print per-thread stack usage.
pub const KERNEL_STACKS: &str = "kernel stacks";

/// List kernel threads.
pub const KERNEL_THREADS: &str = "kernel threads";

/// Built-in persistence self-test (mount, file, active settings).
pub const PERSIST_SMOKE: &str = "stepper persist smoke";

/// Dump persisted settings.
pub const PERSIST_DUMP: &str = "stepper persist dump";

/// Reboot command of current Zephyr shells.
pub const KERNEL_REBOOT: &str = "kernel reboot";

/// Reboot command of older shells.
pub const REBOOT_FALLBACK: &str = "reboot";

/// Select the motor model for `axis`.
pub fn model_set(axis: u8, model: &str) -> String {
    format!("stepper model set {axis} {model}")
}

/// Show the active motor model of `axis`.
pub fn model_show(axis: u8) -> String {
    format!("stepper model show {axis}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_commands() {
        assert_eq!(model_set(0, "17HS3001-20B"), "stepper model set 0 17HS3001-20B");
        assert_eq!(model_show(1), "stepper model show 1");
    }
}
