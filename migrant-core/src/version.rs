/// A version number chosen and ordered by the source driver. Versions are
/// non-negative and the source defines a total order over them; gaps are
/// allowed (the set is sparse).
pub type Version = u64;

/// Sentinel meaning "database is empty / no migration has ever been applied".
///
/// Current-version bookkeeping inside the engine uses `i64` rather than
/// [`Version`] so this sentinel can sit one below zero, matching the source
/// spec's "NilVersion (value -1 internally)".
pub const NIL_VERSION: i64 = -1;
