use async_trait::async_trait;

use crate::error::DriverError;
use crate::version::Version;

/// Abstract target database: current version, apply, lock/unlock, drop.
/// Concrete backends are out of scope; this is the contract they implement.
#[async_trait]
pub trait Database: Send + Sync {
    /// The database's current version, or `None` if no migration has ever
    /// been applied (the engine surfaces that as `Kind::NilVersion`).
    async fn version(&self) -> Result<Option<Version>, DriverError>;

    /// Apply `body` (if any) and atomically record `target_version` as the
    /// new current version. `target_version` may be `-1`, recording the
    /// empty state.
    async fn run(&self, target_version: i64, body: Option<&[u8]>) -> Result<(), DriverError>;

    /// Acquire the database-side advisory lock, mutually excluding other
    /// processes.
    async fn lock(&self) -> Result<(), DriverError>;

    /// Release the database-side advisory lock.
    async fn unlock(&self) -> Result<(), DriverError>;

    /// Wipe all database state, including any migration bookkeeping table.
    async fn drop(&self) -> Result<(), DriverError>;

    /// Release any resources the driver holds.
    async fn close(&self) -> Result<(), DriverError>;
}
