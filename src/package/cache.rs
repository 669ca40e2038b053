use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::package::error::CacheError;
use crate::package::types::{CachedPackage, PackageReference};
use crate::package::version::find_semantic_max;

/// Trait for looking up and storing packages on the local machine
///
/// Implementations never touch the network. Absence is `Ok(None)`; errors
/// are reserved for a broken store.
pub trait PackageStore: Send + Sync + 'static {
    /// Load a cached package
    ///
    /// With `version` absent, any cached version is acceptable and the
    /// latest one is preferred.
    fn load_cached(
        &self,
        id: &str,
        version: Option<&str>,
    ) -> Result<Option<CachedPackage>, CacheError>;

    /// Store a package, replacing an existing entry for the same id and version
    ///
    /// Returns the stored package with its installation timestamp.
    fn install(&self, package: CachedPackage) -> Result<CachedPackage, CacheError>;
}

/// SQLite-backed package store
pub struct PackageCache {
    conn: Mutex<Connection>,
}

impl PackageCache {
    pub fn new(db_path: &Path) -> Result<Self, CacheError> {
        info!("Initializing package cache at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!("Database connection established");

        let cache = Self {
            conn: Mutex::new(conn),
        };

        cache.create_schema()?;
        info!("Package cache initialized successfully");

        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    fn current_timestamp_ms() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default()
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                package_id TEXT NOT NULL,
                version TEXT NOT NULL,
                canonical TEXT,
                source_url TEXT,
                content BLOB NOT NULL,
                installed_at INTEGER NOT NULL,
                UNIQUE(package_id, version)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_package_id ON packages(package_id)",
            [],
        )?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Cached versions of a package, oldest installation first
    pub fn list_versions(&self, id: &str) -> Result<Vec<String>, CacheError> {
        let conn = self.lock_conn()?;
        Self::query_versions(&conn, id)
    }

    fn query_versions(conn: &Connection, id: &str) -> Result<Vec<String>, CacheError> {
        let mut stmt = conn.prepare(
            "SELECT version FROM packages WHERE package_id = ?1 ORDER BY installed_at, id",
        )?;

        let versions = stmt
            .query_map([id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(versions)
    }

    /// Every cached package as an `id#version` reference
    pub fn list_packages(&self) -> Result<Vec<PackageReference>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT package_id, version FROM packages ORDER BY package_id, id")?;

        let packages = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let version: String = row.get(1)?;
                Ok(PackageReference {
                    id,
                    version: Some(version),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(packages)
    }

    /// Remove one cached package version; returns whether it existed
    pub fn remove(&self, id: &str, version: &str) -> Result<bool, CacheError> {
        let conn = self.lock_conn()?;
        let rows = conn.execute(
            "DELETE FROM packages WHERE package_id = ?1 AND version = ?2",
            (id, version),
        )?;

        if rows > 0 {
            debug!("Removed {}#{} from cache", id, version);
        }
        Ok(rows > 0)
    }

    fn query_version(
        conn: &Connection,
        id: &str,
        version: &str,
    ) -> Result<Option<CachedPackage>, CacheError> {
        let package = conn
            .query_row(
                r#"
                SELECT package_id, version, canonical, source_url, content, installed_at
                FROM packages
                WHERE package_id = ?1 AND version = ?2
                "#,
                (id, version),
                |row| {
                    Ok(CachedPackage {
                        id: row.get(0)?,
                        version: row.get(1)?,
                        canonical: row.get(2)?,
                        source_url: row.get(3)?,
                        content: row.get(4)?,
                        installed_at: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(package)
    }
}

impl PackageStore for PackageCache {
    fn load_cached(
        &self,
        id: &str,
        version: Option<&str>,
    ) -> Result<Option<CachedPackage>, CacheError> {
        // One guard for both queries so a concurrent remove cannot slip in
        let conn = self.lock_conn()?;

        if let Some(version) = version {
            return Self::query_version(&conn, id, version);
        }

        let versions = Self::query_versions(&conn, id)?;

        // Prefer the semantic max; versions like "current" fall back to the
        // most recent installation
        let latest = find_semantic_max(&versions).or_else(|| versions.last().map(String::as_str));

        match latest {
            Some(latest) => {
                debug!("Latest cached version of {} is {}", id, latest);
                Self::query_version(&conn, id, latest)
            }
            None => Ok(None),
        }
    }

    fn install(&self, mut package: CachedPackage) -> Result<CachedPackage, CacheError> {
        package.installed_at = Self::current_timestamp_ms();

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO packages (package_id, version, canonical, source_url, content, installed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(package_id, version) DO UPDATE SET
                canonical = excluded.canonical,
                source_url = excluded.source_url,
                content = excluded.content,
                installed_at = excluded.installed_at
            "#,
            (
                &package.id,
                &package.version,
                &package.canonical,
                &package.source_url,
                &package.content,
                package.installed_at,
            ),
        )?;

        info!(
            "Installed {}#{} ({} bytes)",
            package.id,
            package.version,
            package.content.len()
        );
        Ok(package)
    }
}
