use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cancel::CancelToken;
use crate::error::{not_exist, Error, Kind, WrapDriverError};
use crate::logger::Logger;
use crate::migration::Migration;
use crate::source::Source;
use crate::version::{Version, NIL_VERSION};

/// Heterogeneous channel element: either a planned step or a terminal
/// outcome that ends the plan. `NoChange`/`NotExist`/`ShortLimit` are all
/// carried as `Outcome(Error)` since the taxonomy treats them as
/// flow-control errors.
pub(crate) enum PlanStep {
    Migration(Migration),
    Outcome(Error),
}

/// What a plan walk should stop at: an absolute target version, or a
/// direction plus a step count limit (`-1` meaning "no limit", matching
/// `Up()`/`Down()`).
#[derive(Clone, Copy)]
pub(crate) enum Target {
    Absolute(i64),
    Up(i64),
    Down(i64),
}

pub(crate) struct PlannerHandle {
    pub(crate) rx: mpsc::Receiver<PlanStep>,
}

/// Start the planner for one operation: spawns a background task that
/// enumerates the migration records needed to go from `from` to `target`
/// and sends them into a bounded channel, closing it when done.
pub(crate) fn spawn(
    source: Arc<dyn Source>,
    from: i64,
    target: Target,
    prefetch: usize,
    cancel: CancelToken,
    log: Option<Logger>,
) -> PlannerHandle {
    let channel_capacity = prefetch.max(1);
    let (tx, rx) = mpsc::channel(channel_capacity);
    let prefetching = prefetch > 0;

    tokio::spawn(async move {
        let result = match target {
            Target::Absolute(to) => plan_absolute(&*source, from, to, prefetching, &cancel, &log, &tx).await,
            Target::Up(limit) => plan_up(&*source, from, limit, prefetching, &cancel, &log, &tx).await,
            Target::Down(limit) => plan_down(&*source, from, limit, prefetching, &cancel, &log, &tx).await,
        };
        if let Err(err) = result {
            let _ = tx.send(PlanStep::Outcome(err)).await;
        }
    });

    PlannerHandle { rx }
}

/// Read `version`'s up or down payload and emit the resulting record. A
/// `None` payload is still emitted (as an empty migration); the channel
/// send returning an error means the receiver went away, which is treated
/// the same as an observed cancellation (stop quietly).
///
/// The channel slot is reserved before the migration's body is built, so a
/// prefetch buffering task is never spawned ahead of having somewhere to
/// put its result. That keeps the number of in-flight buffering tasks at
/// or below the channel's capacity.
async fn emit<F>(
    version: Version,
    target_version: i64,
    prefetch: bool,
    read: F,
    log: &Option<Logger>,
    tx: &mpsc::Sender<PlanStep>,
) -> Result<bool, Error>
where
    F: std::future::Future<Output = Result<Option<crate::source::MigrationPayload>, crate::error::DriverError>>,
{
    let permit = match tx.reserve().await {
        Ok(permit) => permit,
        Err(_) => return Ok(false),
    };
    let payload = read.await.source_err()?;
    let migration = match payload {
        Some(payload) => {
            if let Some(log) = log {
                log.scheduling(version, target_version);
                if prefetch {
                    log.buffering(version);
                }
            }
            Migration::with_payload(version, target_version, payload, prefetch)
        }
        None => {
            if let Some(log) = log {
                log.scheduling(version, target_version);
            }
            Migration::empty(version, target_version)
        }
    };
    permit.send(PlanStep::Migration(migration));
    Ok(true)
}

/// Plans a walk from `from` to an absolute target `to`, used by
/// `Migrate(to)`.
async fn plan_absolute(
    source: &dyn Source,
    from: i64,
    to: i64,
    prefetch: bool,
    cancel: &CancelToken,
    log: &Option<Logger>,
    tx: &mpsc::Sender<PlanStep>,
) -> Result<(), Error> {
    if from >= 0 && !source::exists(source, from as Version).await.source_err()? {
        return Err(Error::new(not_exist(from as Version)));
    }
    if to >= 0 && !source::exists(source, to as Version).await.source_err()? {
        return Err(Error::new(not_exist(to as Version)));
    }
    if from == to {
        return Err(Error::new(Kind::NoChange));
    }

    if from < to {
        let mut from = from;
        if from == NIL_VERSION {
            let first = source.first().await.source_err()?.expect(
                "from < to with to present implies the source has at least one version",
            );
            if !emit(
                first,
                first as i64,
                prefetch,
                source.read_up(first),
                log,
                tx,
            )
            .await?
            {
                return Ok(());
            }
            from = first as i64;
        }

        while from < to {
            if cancel.is_stopped() {
                return Ok(());
            }
            let next = source
                .next(from as Version)
                .await
                .source_err()?
                .expect("from < to implies a next version exists on the way to to");
            if !emit(
                next,
                next as i64,
                prefetch,
                source.read_up(next),
                log,
                tx,
            )
            .await?
            {
                return Ok(());
            }
            from = next as i64;
        }
        return Ok(());
    }

    // downward
    let mut from = from;
    while from > to && from >= 0 {
        if cancel.is_stopped() {
            return Ok(());
        }
        let prev = source.prev(from as Version).await.source_err()?;
        match prev {
            None if to == NIL_VERSION => {
                emit(
                    from as Version,
                    NIL_VERSION,
                    prefetch,
                    source.read_down(from as Version),
                    log,
                    tx,
                )
                .await?;
                return Ok(());
            }
            None => return Ok(()),
            Some(prev) => {
                if !emit(
                    from as Version,
                    prev as i64,
                    prefetch,
                    source.read_down(from as Version),
                    log,
                    tx,
                )
                .await?
                {
                    return Ok(());
                }
                from = prev as i64;
            }
        }
    }
    Ok(())
}

/// Plans an upward walk from `from`, used by `Up()` (`limit = -1`) and
/// `Steps(n > 0)` (`limit = n`).
async fn plan_up(
    source: &dyn Source,
    from: i64,
    limit: i64,
    prefetch: bool,
    cancel: &CancelToken,
    log: &Option<Logger>,
    tx: &mpsc::Sender<PlanStep>,
) -> Result<(), Error> {
    if limit == 0 {
        return Err(Error::new(Kind::NoChange));
    }
    if from >= 0 && !source::exists(source, from as Version).await.source_err()? {
        return Err(Error::new(not_exist(from as Version)));
    }

    let mut from = from;
    let mut count: i64 = 0;
    loop {
        if !(count < limit || limit == -1) {
            return Ok(());
        }
        if cancel.is_stopped() {
            return Ok(());
        }

        if from == NIL_VERSION {
            let first = source.first().await.source_err()?;
            match first {
                None => return Err(Error::new(Kind::NoChange)),
                Some(first) => {
                    if !emit(
                        first,
                        first as i64,
                        prefetch,
                        source.read_up(first),
                        log,
                        tx,
                    )
                    .await?
                    {
                        return Ok(());
                    }
                    from = first as i64;
                    count += 1;
                    continue;
                }
            }
        }

        let next = source.next(from as Version).await.source_err()?;
        match next {
            None if limit == -1 && count == 0 => return Err(Error::new(Kind::NoChange)),
            None if limit == -1 => return Ok(()),
            None if limit > 0 && count == 0 => return Err(Error::new(not_exist(from as Version))),
            None => {
                tx.send(PlanStep::Outcome(Error::new(Kind::ShortLimit(
                    (limit - count) as u64,
                ))))
                .await
                .ok();
                return Ok(());
            }
            Some(next) => {
                if !emit(
                    next,
                    next as i64,
                    prefetch,
                    source.read_up(next),
                    log,
                    tx,
                )
                .await?
                {
                    return Ok(());
                }
                from = next as i64;
                count += 1;
            }
        }
    }
}

/// Plans a downward walk from `from`, used by `Down()` (`limit = -1`) and
/// `Steps(n < 0)` (`limit = -n`).
async fn plan_down(
    source: &dyn Source,
    from: i64,
    limit: i64,
    prefetch: bool,
    cancel: &CancelToken,
    log: &Option<Logger>,
    tx: &mpsc::Sender<PlanStep>,
) -> Result<(), Error> {
    if limit == 0 {
        return Err(Error::new(Kind::NoChange));
    }
    if from >= 0 && !source::exists(source, from as Version).await.source_err()? {
        return Err(Error::new(not_exist(from as Version)));
    }
    if from == NIL_VERSION && limit == -1 {
        return Err(Error::new(Kind::NoChange));
    }
    if from == NIL_VERSION && limit > 0 {
        return Err(Error::new(Kind::NotExist(from)));
    }

    let mut from = from;
    let mut count: i64 = 0;
    loop {
        if !(count < limit || limit == -1) {
            return Ok(());
        }
        if cancel.is_stopped() {
            return Ok(());
        }

        let prev = source.prev(from as Version).await.source_err()?;
        match prev {
            None => {
                let remaining = limit == -1 || limit - count > 0;
                if remaining {
                    let first = source
                        .first()
                        .await
                        .source_err()?
                        .expect("prev(from) being absent implies from is itself the first version");
                    emit(
                        first,
                        NIL_VERSION,
                        prefetch,
                        source.read_down(first),
                        log,
                        tx,
                    )
                    .await?;
                    count += 1;
                }
                if limit != -1 && count < limit {
                    tx.send(PlanStep::Outcome(Error::new(Kind::ShortLimit(
                        (limit - count) as u64,
                    ))))
                    .await
                    .ok();
                }
                return Ok(());
            }
            Some(prev) => {
                if !emit(
                    from as Version,
                    prev as i64,
                    prefetch,
                    source.read_down(from as Version),
                    log,
                    tx,
                )
                .await?
                {
                    return Ok(());
                }
                from = prev as i64;
                count += 1;
            }
        }
    }
}

/// Local re-export so `plan_*` can call `exists` without importing the
/// whole `source` module namespace at every call site.
mod source {
    pub(crate) use crate::source::version_exists as exists;
}
