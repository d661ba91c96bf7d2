use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use url::Url;

use crate::database::Database;
use crate::error::{Error, Kind};
use crate::source::Source;

/// Opens a [`Source`] for URLs of a scheme this factory is registered
/// under.
#[async_trait]
pub trait SourceFactory: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Arc<dyn Source>, Error>;
}

/// Opens a [`Database`] for URLs of a scheme this factory is registered
/// under.
#[async_trait]
pub trait DatabaseFactory: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Arc<dyn Database>, Error>;
}

fn source_registry() -> &'static RwLock<HashMap<String, Arc<dyn SourceFactory>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<dyn SourceFactory>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn database_registry() -> &'static RwLock<HashMap<String, Arc<dyn DatabaseFactory>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<dyn DatabaseFactory>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register a source driver factory for `scheme`. Intended to be called at
/// a driver crate's own initialization time. Scheme matching is
/// case-sensitive. A later registration for the same scheme replaces the
/// earlier one.
pub fn register_source(scheme: impl Into<String>, factory: Arc<dyn SourceFactory>) {
    source_registry()
        .write()
        .expect("source registry lock poisoned")
        .insert(scheme.into(), factory);
}

/// Register a database driver factory for `scheme`.
pub fn register_database(scheme: impl Into<String>, factory: Arc<dyn DatabaseFactory>) {
    database_registry()
        .write()
        .expect("database registry lock poisoned")
        .insert(scheme.into(), factory);
}

fn parse_scheme(raw_url: &str) -> Result<Url, Error> {
    let url = Url::parse(raw_url).map_err(|e| Error::new(Kind::Url(e)))?;
    if url.scheme().is_empty() {
        return Err(Error::new(Kind::Registry(String::new())));
    }
    Ok(url)
}

pub(crate) async fn open_source(raw_url: &str) -> Result<Arc<dyn Source>, Error> {
    let url = parse_scheme(raw_url)?;
    let factory = source_registry()
        .read()
        .expect("source registry lock poisoned")
        .get(url.scheme())
        .cloned()
        .ok_or_else(|| Error::new(Kind::Registry(url.scheme().to_string())))?;
    factory.open(&url).await
}

pub(crate) async fn open_database(raw_url: &str) -> Result<Arc<dyn Database>, Error> {
    let url = parse_scheme(raw_url)?;
    let factory = database_registry()
        .read()
        .expect("database registry lock poisoned")
        .get(url.scheme())
        .cloned()
        .ok_or_else(|| Error::new(Kind::Registry(url.scheme().to_string())))?;
    factory.open(&url).await
}
