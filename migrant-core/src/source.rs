use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::DriverError;
use crate::version::Version;

/// A readable migration payload together with whatever identifier the
/// source driver attached to it; the identifier may be empty.
pub struct MigrationPayload {
    pub body: Pin<Box<dyn AsyncRead + Send>>,
    pub identifier: String,
}

impl MigrationPayload {
    pub fn new(body: impl AsyncRead + Send + 'static, identifier: impl Into<String>) -> Self {
        MigrationPayload {
            body: Box::pin(body),
            identifier: identifier.into(),
        }
    }
}

/// Abstract access to the ordered, sparse set of versions a source driver
/// knows about and their up/down payloads.
///
/// Concrete drivers (filesystem, HTTP, embedded bundles) are out of scope
/// for this crate; this trait is the contract they implement. It is
/// object-safe on purpose, matching the heterogeneous `Arc<dyn Source>`
/// handles the driver registry must be able to hand back regardless of
/// which concrete driver opened a given URL.
#[async_trait]
pub trait Source: Send + Sync {
    /// The smallest known version, or `None` if the source has no versions
    /// at all.
    async fn first(&self) -> Result<Option<Version>, DriverError>;

    /// The strictly-next known version after `version`, or `None` if
    /// `version` is the last one.
    async fn next(&self, version: Version) -> Result<Option<Version>, DriverError>;

    /// The strictly-previous known version before `version`, or `None` if
    /// `version` is the first one.
    async fn prev(&self, version: Version) -> Result<Option<Version>, DriverError>;

    /// The up payload for `version`, or `None` if this version has no up
    /// migration (in which case it is still applied as an empty migration).
    async fn read_up(&self, version: Version) -> Result<Option<MigrationPayload>, DriverError>;

    /// The down payload for `version`, or `None` if this version has no
    /// down migration.
    async fn read_down(&self, version: Version) -> Result<Option<MigrationPayload>, DriverError>;

    /// Release any resources the driver holds.
    async fn close(&self) -> Result<(), DriverError>;
}

/// A version is present iff at least one of `read_up`/`read_down` yields a
/// stream.
pub(crate) async fn version_exists(source: &dyn Source, version: Version) -> Result<bool, DriverError> {
    if source.read_up(version).await?.is_some() {
        return Ok(true);
    }
    Ok(source.read_down(version).await?.is_some())
}
