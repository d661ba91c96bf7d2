use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::io::AsyncReadExt;
use tokio::sync::oneshot;

use crate::error::{DriverError, Error, Kind};
use crate::source::MigrationPayload;
use crate::version::Version;

/// Once buffering starts (either eagerly, under prefetch, or lazily on
/// first read), it resolves to the full body plus the timestamps the copy
/// started and finished at.
struct Buffered {
    bytes: Vec<u8>,
    started_buffering: OffsetDateTime,
    finished_reading: OffsetDateTime,
}

impl Buffered {
    fn read_time(&self) -> Duration {
        (self.finished_reading - self.started_buffering)
            .try_into()
            .unwrap_or(Duration::ZERO)
    }
}

enum BodyState {
    /// Prefetch disabled, or this record hasn't reached the front of the
    /// pipeline yet: the raw stream is parked here until something asks
    /// for it.
    Deferred(tokio::sync::Mutex<Option<BoxedBody>>),
    /// A background task is already copying the stream into memory;
    /// `FinishedReading` becomes available the moment it completes.
    Prefetching(oneshot::Receiver<Result<Buffered, DriverError>>),
}

type BoxedBody = std::pin::Pin<Box<dyn tokio::io::AsyncRead + Send>>;

/// A migration's body: a stream of bytes that is, or will be, buffered
/// into memory before the runner invokes the database driver. Exactly one
/// `Migration` owns a `MigrationBody` at a time; once the runner consumes
/// it, it must not be read again.
pub struct MigrationBody {
    identifier: String,
    state: BodyState,
}

impl MigrationBody {
    /// Build a body from a freshly-read source payload. When `prefetch` is
    /// true, a background task begins copying the stream immediately;
    /// otherwise the stream is parked and read synchronously the first
    /// time something awaits it.
    fn new(payload: MigrationPayload, prefetch: bool) -> Self {
        let MigrationPayload { body, identifier } = payload;

        let state = if prefetch {
            let (tx, rx) = oneshot::channel();
            tokio::spawn(async move {
                let started_buffering = OffsetDateTime::now_utc();
                let result = buffer_stream(body).await.map(|bytes| Buffered {
                    bytes,
                    started_buffering,
                    finished_reading: OffsetDateTime::now_utc(),
                });
                let _ = tx.send(result);
            });
            BodyState::Prefetching(rx)
        } else {
            BodyState::Deferred(tokio::sync::Mutex::new(Some(body)))
        };

        MigrationBody { identifier, state }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Wait for buffering to complete (or perform it now, for the
    /// lazily-deferred case) and return the buffered bytes plus how long
    /// reading took. Consumes the body; it must not be read again
    /// afterward.
    async fn into_buffered(self) -> Result<Buffered, Error> {
        match self.state {
            BodyState::Prefetching(rx) => rx
                .await
                .map_err(|_| Error::new(Kind::Driver("buffering task dropped without a result".into())))?
                .map_err(|e| Error::new(Kind::Driver(e))),
            BodyState::Deferred(mutex) => {
                let stream = mutex
                    .lock()
                    .await
                    .take()
                    .expect("MigrationBody read more than once");
                let started_buffering = OffsetDateTime::now_utc();
                let bytes = buffer_stream(stream).await.map_err(|e| Error::new(Kind::Driver(e)))?;
                Ok(Buffered {
                    bytes,
                    started_buffering,
                    finished_reading: OffsetDateTime::now_utc(),
                })
            }
        }
    }
}

async fn buffer_stream(mut body: BoxedBody) -> Result<Vec<u8>, DriverError> {
    let mut buf = Vec::new();
    body.read_to_end(&mut buf)
        .await
        .map_err(|e| Box::new(e) as DriverError)?;
    Ok(buf)
}

/// A single planned migration step: the version it originates from, the
/// version the database will be at after it's applied, and either a body
/// to apply or nothing (an "empty migration" that only records the
/// version change). Built by the planner, owned by the pipeline channel
/// until the runner consumes it.
pub struct Migration {
    version: Version,
    target_version: i64,
    body: Option<MigrationBody>,
}

impl Migration {
    pub(crate) fn empty(version: Version, target_version: i64) -> Self {
        Migration {
            version,
            target_version,
            body: None,
        }
    }

    pub(crate) fn with_payload(
        version: Version,
        target_version: i64,
        payload: MigrationPayload,
        prefetch: bool,
    ) -> Self {
        Migration {
            version,
            target_version,
            body: Some(MigrationBody::new(payload, prefetch)),
        }
    }

    /// The source version this record originates from.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The version the database will be at after this record is applied.
    pub fn target_version(&self) -> i64 {
        self.target_version
    }

    /// The migration's identifier, empty for empty migrations.
    pub fn identifier(&self) -> &str {
        self.body.as_ref().map(MigrationBody::identifier).unwrap_or("")
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Resolve this record into what the runner needs to invoke the
    /// database driver: the bytes to apply (if any) and how long reading
    /// them took. Consumes `self`.
    pub(crate) async fn into_applied(self) -> Result<(Option<Arc<[u8]>>, Option<Duration>), Error> {
        match self.body {
            None => Ok((None, None)),
            Some(body) => {
                let buffered = body.into_buffered().await?;
                let read_time = buffered.read_time();
                Ok((Some(Arc::from(buffered.bytes)), Some(read_time)))
            }
        }
    }
}
