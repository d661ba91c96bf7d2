use crate::report::AppliedStep;

/// Thin wrapper around the `log` facade. Carried as `Option<Logger>` on
/// [`crate::Engine`]; a missing logger means the engine never calls into
/// `log` for per-step lines at all (separate from whatever level
/// filtering `log`'s installed backend applies on top).
#[derive(Clone, Copy, Debug, Default)]
pub struct Logger {
    verbose: bool,
}

impl Logger {
    /// Build a logger. `verbose` additionally enables scheduling/buffering
    /// debug lines.
    pub fn new(verbose: bool) -> Self {
        Logger { verbose }
    }

    pub(crate) fn applied(&self, step: &AppliedStep) {
        log::info!(
            target: "migrant_core::runner",
            "applied version {} -> target {} ({}) read={:?} run={:?}",
            step.version(),
            step.target_version(),
            if step.identifier().is_empty() {
                "empty"
            } else {
                step.identifier()
            },
            step.read_time(),
            step.run_time(),
        );
    }

    pub(crate) fn scheduling(&self, version: u64, target_version: i64) {
        if self.verbose {
            log::debug!(
                target: "migrant_core::planner",
                "scheduling migration version {version} -> target {target_version}"
            );
        }
    }

    pub(crate) fn buffering(&self, version: u64) {
        if self.verbose {
            log::debug!(
                target: "migrant_core::pipeline",
                "started buffering body for version {version}"
            );
        }
    }
}
