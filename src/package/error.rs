use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Package not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),
}

/// Errors surfaced by [`PackageResolver`](crate::package::resolver::PackageResolver)
///
/// Per-server transport failures never appear here; they are logged and the
/// next server is tried. Absence is reported as `Ok(None)`.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Local cache failure: {0}")]
    Cache(#[from] CacheError),

    #[error("Registry failure: {0}")]
    Registry(#[from] RegistryError),
}
