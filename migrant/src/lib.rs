/*!
Database-agnostic schema migration engine.

`migrant` runs a sequence of numbered migrations against a target database,
advancing or rewinding it between versions. It guarantees at most one
migrator runs at a time via a process-local lock composed with the
database driver's own advisory lock, overlaps migration-body I/O with the
previous step's application via a bounded prefetch pipeline, and supports
cooperative, one-shot cancellation.

Concrete drivers aren't shipped by this crate: implement [`Source`] for
wherever your migrations live (filesystem, embedded bundle, HTTP) and
[`Database`] for whatever you're migrating, then either construct an
[`Engine`] directly from your driver instances or register factories under
a URL scheme with [`register_source`]/[`register_database`] and let
[`Engine::new`] open both from connection strings.

### Example

```rust,ignore
use migrant::{Engine, EngineConfig, Logger};

# async fn run(source: std::sync::Arc<dyn migrant::Source>, database: std::sync::Arc<dyn migrant::Database>) -> Result<(), migrant::Error> {
let engine = Engine::from_drivers(source, database)
    .with_config(EngineConfig::new().with_logger(Logger::new(true)));

let report = engine.up().await?;
for step in report.applied() {
    println!("applied {} -> {}", step.version(), step.target_version());
}
# Ok(())
# }
```
*/

pub use migrant_core::{
    register_database, register_source, AppliedStep, Database, DatabaseFactory, DriverError,
    Engine, EngineConfig, Error, Kind, Logger, Migration, MigrationPayload, Report, Source,
    SourceFactory, Version, DEFAULT_PREFETCH_MIGRATIONS, NIL_VERSION,
};
