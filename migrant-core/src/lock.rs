use std::sync::Arc;

use tokio::sync::Mutex;

use crate::database::Database;
use crate::error::{Error, Kind, WrapDriverError};

/// Process-local mutex guarding a database-side advisory lock. Guarantees
/// at-most-one migrator per engine instance; combined with the database
/// driver's own `Lock`/`Unlock`, guards against concurrent migrators across
/// processes too.
#[derive(Default)]
pub(crate) struct LockCoordinator {
    is_locked: Mutex<bool>,
}

impl LockCoordinator {
    pub(crate) fn new() -> Self {
        LockCoordinator {
            is_locked: Mutex::new(false),
        }
    }

    /// Acquire the lock. Returns `Kind::Locked` without touching the
    /// driver if this engine already holds it.
    pub(crate) async fn lock(&self, database: &Arc<dyn Database>) -> Result<(), Error> {
        let mut guard = self.is_locked.lock().await;
        if *guard {
            return Err(Error::new(Kind::Locked));
        }
        database.lock().await.database_err()?;
        *guard = true;
        Ok(())
    }

    /// Release the lock. On a driver failure the flag is left set: a
    /// driver that refuses to unlock will make every subsequent `lock()`
    /// on this engine return `Locked` until the process is restarted.
    pub(crate) async fn unlock(&self, database: &Arc<dyn Database>) -> Result<(), Error> {
        let mut guard = self.is_locked.lock().await;
        database.unlock().await.database_err()?;
        *guard = false;
        Ok(())
    }
}

/// Run `op` under the lock, releasing it on every exit path and composing
/// any unlock failure with the operation's own error rather than replacing
/// it.
pub(crate) async fn guarded<T, F, Fut>(
    lock: &LockCoordinator,
    database: &Arc<dyn Database>,
    op: F,
) -> Result<T, Error>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    lock.lock(database).await?;
    let result = op().await;
    let unlock_result = lock.unlock(database).await;

    match (result, unlock_result) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(unlock_err)) => Err(unlock_err),
        (Err(op_err), Ok(())) => Err(op_err),
        (Err(op_err), Err(unlock_err)) => Err(op_err.compose_with_unlock(unlock_err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::error::DriverError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingDatabase {
        locks: AtomicU32,
        unlocks: AtomicU32,
        fail_unlock: bool,
    }

    #[async_trait]
    impl Database for CountingDatabase {
        async fn version(&self) -> Result<Option<crate::version::Version>, DriverError> {
            Ok(None)
        }
        async fn run(&self, _target_version: i64, _body: Option<&[u8]>) -> Result<(), DriverError> {
            Ok(())
        }
        async fn lock(&self) -> Result<(), DriverError> {
            self.locks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn unlock(&self) -> Result<(), DriverError> {
            self.unlocks.fetch_add(1, Ordering::SeqCst);
            if self.fail_unlock {
                return Err("unlock refused".into());
            }
            Ok(())
        }
        async fn drop(&self) -> Result<(), DriverError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn lock_and_unlock_counts_match_on_success() {
        let db: Arc<dyn Database> = Arc::new(CountingDatabase::default());
        let coordinator = LockCoordinator::new();
        let result = guarded(&coordinator, &db, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn second_lock_while_held_returns_locked_without_touching_driver() {
        let db: Arc<dyn Database> = Arc::new(CountingDatabase::default());
        let coordinator = LockCoordinator::new();
        coordinator.lock(&db).await.unwrap();
        let err = coordinator.lock(&db).await.unwrap_err();
        assert!(matches!(err.kind(), Kind::Locked));
    }

    #[tokio::test]
    async fn unlock_failure_after_op_error_composes_both_messages() {
        let db: Arc<dyn Database> = Arc::new(CountingDatabase {
            fail_unlock: true,
            ..Default::default()
        });
        let coordinator = LockCoordinator::new();
        let result: Result<(), Error> = guarded(&coordinator, &db, || async {
            Err(Error::new(Kind::NoChange))
        })
        .await;
        let err = result.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("no change"));
        assert!(message.contains("database driver error"));
    }
}
