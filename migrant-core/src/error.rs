use std::fmt;

use thiserror::Error as TError;

use crate::report::Report;
use crate::version::Version;

/// Boxed, opaque error returned by a driver. Drivers are out of scope for
/// this crate (they are specified only by their trait contracts), so their
/// failures are absorbed here and propagated verbatim.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An error produced while planning or running migrations: a boxed
/// [`Kind`] plus an optional [`Report`] describing whatever progress was
/// made before the error surfaced.
#[derive(Debug)]
pub struct Error {
    kind: Box<Kind>,
    report: Option<Report>,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            kind: Box::new(kind),
            report: None,
        }
    }

    pub(crate) fn with_report(kind: Kind, report: Report) -> Error {
        Error {
            kind: Box::new(kind),
            report: Some(report),
        }
    }

    /// The report of whatever migrations were successfully applied before
    /// this error occurred, if the operation got far enough to apply any.
    pub fn report(&self) -> Option<&Report> {
        self.report.as_ref()
    }

    /// The specific kind of error that occurred.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// True if this is the `NoChange` flow-control outcome.
    pub fn is_no_change(&self) -> bool {
        matches!(*self.kind, Kind::NoChange)
    }

    /// True if this is the `NotExist` flow-control outcome.
    pub fn is_not_exist(&self) -> bool {
        matches!(*self.kind, Kind::NotExist(_))
    }

    /// True if this is the `ShortLimit` flow-control outcome, and if so, the
    /// shortfall it carries.
    pub fn short_limit(&self) -> Option<u64> {
        match *self.kind {
            Kind::ShortLimit(n) => Some(n),
            _ => None,
        }
    }

    /// Attach the progress made before this error occurred, if it doesn't
    /// already carry a report.
    pub(crate) fn with_progress(mut self, report: Report) -> Error {
        if self.report.is_none() {
            self.report = Some(report);
        }
        self
    }

    pub(crate) fn compose_with_unlock(self, unlock_err: Error) -> Error {
        let report = self.report.clone().or_else(|| unlock_err.report.clone());
        Error {
            kind: Box::new(Kind::Multi(self.kind, unlock_err.kind)),
            report,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.kind.source()
    }
}

/// The taxonomy of outcomes an operation can return. `NoChange`, `NotExist`
/// and `ShortLimit` are planner outcomes surfaced as errors purely for flow
/// control; `Driver`/`DatabaseDriver` wrap opaque collaborator failures
/// verbatim; `Multi` is the lock coordinator's unlock-composition variant.
#[derive(Debug, TError)]
pub enum Kind {
    /// The operation was a no-op: the target equals the current version, or
    /// a limited step count had nothing left to do.
    #[error("no change")]
    NoChange,
    /// `Version()` was called but no migration has ever been applied.
    #[error("no migration has been applied")]
    NilVersion,
    /// The engine already holds its process-local lock.
    #[error("database is locked")]
    Locked,
    /// A referenced version is absent from the source index.
    #[error("version {0} does not exist in the source")]
    NotExist(i64),
    /// An up-step-with-limit ran out of migrations before the requested
    /// count; the payload is the shortfall.
    #[error("not enough migrations to satisfy requested steps, {0} short")]
    ShortLimit(u64),
    /// An opaque failure from the source driver.
    #[error("source driver error: {0}")]
    Driver(#[source] DriverError),
    /// An opaque failure from the database driver.
    #[error("database driver error: {0}")]
    DatabaseDriver(#[source] DriverError),
    /// The URL passed to an engine constructor has no scheme, or otherwise
    /// could not be parsed.
    #[error("invalid driver url: {0}")]
    Url(#[source] url::ParseError),
    /// No factory is registered for the URL's scheme.
    #[error("no driver registered for scheme {0:?}")]
    Registry(String),
    /// Composition of a primary error with a subsequent unlock failure; its
    /// `Display` concatenates both messages.
    #[error("{0}; {1}")]
    Multi(Box<Kind>, Box<Kind>),
}

/// Extension trait for absorbing a driver's opaque error into an
/// [`Error`], optionally attaching the [`Report`] of progress made so far.
pub(crate) trait WrapDriverError<T> {
    fn source_err(self) -> Result<T, Error>;
    fn database_err(self) -> Result<T, Error>;
}

impl<T, E> WrapDriverError<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn source_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::new(Kind::Driver(Box::new(e))))
    }

    fn database_err(self) -> Result<T, Error> {
        self.map_err(|e| Error::new(Kind::DatabaseDriver(Box::new(e))))
    }
}

/// `NotExist(i64)` stores the raw version so both source-side and
/// "downward fell off the beginning" cases can be reported without a
/// second variant; this helper builds it from a `Version`.
pub(crate) fn not_exist(version: Version) -> Kind {
    Kind::NotExist(version as i64)
}
