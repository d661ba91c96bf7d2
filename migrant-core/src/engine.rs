use std::sync::Arc;

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::database::Database;
use crate::error::{Error, Kind, WrapDriverError};
use crate::lock::{self, LockCoordinator};
use crate::planner::{self, Target};
use crate::registry;
use crate::report::Report;
use crate::runner;
use crate::source::Source;
use crate::version::{Version, NIL_VERSION};

/// The engine state held for the lifetime of one migrator instance: the
/// source and database driver handles, the optional logger, the prefetch
/// depth, the lock coordinator, and the graceful-stop signal.
pub struct Engine {
    source: Arc<dyn Source>,
    database: Arc<dyn Database>,
    database_name: Option<String>,
    config: EngineConfig,
    lock: LockCoordinator,
    cancel: CancelToken,
}

impl Engine {
    /// Open both drivers from URLs via the global registry.
    pub async fn new(source_url: &str, database_url: &str) -> Result<Self, Error> {
        let source = registry::open_source(source_url).await?;
        let database = registry::open_database(database_url).await?;
        Ok(Self::from_drivers(source, database))
    }

    /// Open the source driver from a URL, using an already-opened database
    /// driver instance. `database_name` is carried only for diagnostics
    /// (log lines, error context).
    pub async fn from_database(
        source_url: &str,
        database: Arc<dyn Database>,
        database_name: impl Into<String>,
    ) -> Result<Self, Error> {
        let source = registry::open_source(source_url).await?;
        let mut engine = Self::from_drivers(source, database);
        engine.database_name = Some(database_name.into());
        Ok(engine)
    }

    /// Open the database driver from a URL, using an already-opened source
    /// driver instance.
    pub async fn from_source(source: Arc<dyn Source>, database_url: &str) -> Result<Self, Error> {
        let database = registry::open_database(database_url).await?;
        Ok(Self::from_drivers(source, database))
    }

    /// Build an engine from two already-opened driver instances.
    pub fn from_drivers(source: Arc<dyn Source>, database: Arc<dyn Database>) -> Self {
        Engine {
            source,
            database,
            database_name: None,
            config: EngineConfig::default(),
            lock: LockCoordinator::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Replace the engine's configuration (prefetch depth, logger).
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Send the cooperative, one-shot, sticky stop signal. Planner and
    /// runner loops observe it at their next safe point; an in-flight
    /// database call is not aborted.
    pub fn graceful_stop(&self) {
        self.cancel.stop();
    }

    /// The database's current version, or `Kind::NilVersion` if no
    /// migration has ever been applied.
    pub async fn version(&self) -> Result<Version, Error> {
        self.database
            .version()
            .await
            .database_err()?
            .ok_or_else(|| Error::new(Kind::NilVersion))
    }

    async fn current_version(&self) -> Result<i64, Error> {
        Ok(self
            .database
            .version()
            .await
            .database_err()?
            .map(|v| v as i64)
            .unwrap_or(NIL_VERSION))
    }

    /// Migrate to an absolute target version, or to `NIL_VERSION` (`-1`)
    /// to reverse all the way to the empty state.
    pub async fn migrate(&self, to: i64) -> Result<Report, Error> {
        self.run_plan(Target::Absolute(to)).await
    }

    /// Step `n` migrations; positive steps up, negative steps down, `0` is
    /// a no-op.
    pub async fn steps(&self, n: i64) -> Result<Report, Error> {
        match n {
            0 => Err(Error::new(Kind::NoChange)),
            n if n > 0 => self.run_plan(Target::Up(n)).await,
            n => self.run_plan(Target::Down(-n)).await,
        }
    }

    /// Apply all remaining up migrations.
    pub async fn up(&self) -> Result<Report, Error> {
        self.run_plan(Target::Up(-1)).await
    }

    /// Reverse all the way back to the empty state.
    pub async fn down(&self) -> Result<Report, Error> {
        self.run_plan(Target::Down(-1)).await
    }

    async fn run_plan(&self, target: Target) -> Result<Report, Error> {
        let source = self.source.clone();
        let database = self.database.clone();
        let cancel = self.cancel.clone();
        let log = self.config.logger();
        let prefetch = self.config.prefetch_migrations();

        lock::guarded(&self.lock, &self.database, || async move {
            let from = self.current_version().await?;
            let handle = planner::spawn(source, from, target, prefetch, cancel.clone(), log);
            runner::run(handle, database, cancel, log).await
        })
        .await
    }

    /// Invoke the driver's `Drop` under the lock.
    pub async fn drop(&self) -> Result<(), Error> {
        let database = self.database.clone();
        lock::guarded(&self.lock, &self.database, || async move {
            database.drop().await.database_err()
        })
        .await
    }

    /// Close both drivers in parallel and return both results. Does not
    /// unlock; callers are expected to have completed operations first.
    pub async fn close(&self) -> (Result<(), Error>, Result<(), Error>) {
        let (source_result, database_result) =
            tokio::join!(self.source.close(), self.database.close());
        (source_result.source_err(), database_result.database_err())
    }

    /// The name given to the pre-opened database driver in
    /// [`Engine::from_database`], if any.
    pub fn database_name(&self) -> Option<&str> {
        self.database_name.as_deref()
    }
}
