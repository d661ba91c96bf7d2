//! Planner, prefetch pipeline and runner that drive a schema migration
//! engine: given a sequence of numbered "up"/"down" migration artifacts
//! supplied by a [`Source`], advance or rewind a [`Database`] between
//! versions, guaranteeing at most one migrator runs at a time.
//!
//! Concrete source and database drivers are out of scope for this crate,
//! see [`Source`] and [`Database`] for the contracts a driver implements,
//! as is URL parsing beyond scheme extraction, a CLI, and log formatting.

mod cancel;
mod config;
mod database;
mod engine;
mod error;
mod lock;
mod logger;
mod migration;
mod planner;
mod registry;
mod report;
mod runner;
mod source;
mod version;

pub use crate::config::{EngineConfig, DEFAULT_PREFETCH_MIGRATIONS};
pub use crate::database::Database;
pub use crate::engine::Engine;
pub use crate::error::{DriverError, Error, Kind};
pub use crate::logger::Logger;
pub use crate::migration::Migration;
pub use crate::registry::{register_database, register_source, DatabaseFactory, SourceFactory};
pub use crate::report::{AppliedStep, Report};
pub use crate::source::{MigrationPayload, Source};
pub use crate::version::{Version, NIL_VERSION};
