use std::sync::Arc;
use std::time::Instant;

use crate::cancel::CancelToken;
use crate::database::Database;
use crate::error::{Error, WrapDriverError};
use crate::logger::Logger;
use crate::planner::{PlanStep, PlannerHandle};
use crate::report::{AppliedStep, Report};

/// Consume the planner's channel until it closes, invoking the database
/// driver for each migration record in order and accumulating a [`Report`].
///
/// On a driver error, returns it immediately (leaving whatever was applied
/// so far in `Report`); remaining records, if any are still buffering in
/// the background, are simply dropped along with the channel.
pub(crate) async fn run(
    mut planner: PlannerHandle,
    database: Arc<dyn Database>,
    cancel: CancelToken,
    log: Option<Logger>,
) -> Result<Report, Error> {
    let mut report = Report::new();

    while let Some(step) = planner.rx.recv().await {
        if cancel.is_stopped() {
            return Ok(report);
        }

        match step {
            PlanStep::Outcome(err) => {
                return if report.applied().is_empty() {
                    Err(err)
                } else {
                    Err(err.with_progress(report))
                };
            }
            PlanStep::Migration(migration) => {
                let version = migration.version();
                let target_version = migration.target_version();
                let identifier = migration.identifier().to_string();

                let (body, read_time) = migration.into_applied().await?;

                let started_run = Instant::now();
                let run_result = database.run(target_version, body.as_deref()).await;
                let run_time = started_run.elapsed();

                match run_result.database_err() {
                    Ok(()) => {
                        let step = AppliedStep::new(version, target_version, identifier, read_time, run_time);
                        if let Some(log) = &log {
                            log.applied(&step);
                        }
                        report.push(step);
                    }
                    Err(err) => return Err(err.with_progress(report)),
                }
            }
        }
    }

    Ok(report)
}
