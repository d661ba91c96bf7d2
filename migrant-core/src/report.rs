use std::time::Duration;

use crate::version::Version;

/// A single migration step the runner successfully applied.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AppliedStep {
    version: Version,
    target_version: i64,
    identifier: String,
    read_time: Option<Duration>,
    run_time: Duration,
}

impl AppliedStep {
    pub(crate) fn new(
        version: Version,
        target_version: i64,
        identifier: String,
        read_time: Option<Duration>,
        run_time: Duration,
    ) -> Self {
        AppliedStep {
            version,
            target_version,
            identifier,
            read_time,
            run_time,
        }
    }

    /// The source version this step originated from.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The version the database was at after this step was applied.
    pub fn target_version(&self) -> i64 {
        self.target_version
    }

    /// The migration's identifier, empty if the source didn't supply one.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// How long the pipeline spent buffering this step's body, if it had
    /// one. `None` for empty migrations.
    pub fn read_time(&self) -> Option<Duration> {
        self.read_time
    }

    /// How long the database driver's `Run` call took.
    pub fn run_time(&self) -> Duration {
        self.run_time
    }
}

/// Accumulated record of the migrations a single engine operation applied,
/// returned alongside a successful `Migrate`/`Steps`/`Up`/`Down`, and
/// attached to [`crate::Error`] when an operation fails partway through.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Report {
    applied: Vec<AppliedStep>,
}

impl Report {
    pub(crate) fn new() -> Self {
        Report { applied: Vec::new() }
    }

    pub(crate) fn push(&mut self, step: AppliedStep) {
        self.applied.push(step);
    }

    /// The steps applied, in application order.
    pub fn applied(&self) -> &[AppliedStep] {
        &self.applied
    }

    /// The version the database ended up at, or `NIL_VERSION` if nothing
    /// was applied.
    pub fn final_version(&self) -> i64 {
        self.applied
            .last()
            .map(|s| s.target_version)
            .unwrap_or(crate::version::NIL_VERSION)
    }
}
