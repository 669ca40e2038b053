use serde::Deserialize;
use std::path::PathBuf;

// =============================================================================
// Registry defaults
// =============================================================================

/// Primary public package server
pub const PRIMARY_SERVER: &str = "https://packages.fhir.org";

/// Secondary public package server, tried when the primary fails
pub const SECONDARY_SERVER: &str = "https://packages2.fhir.org/packages";

/// Timeout for a single registry request in milliseconds (30 seconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// User agent sent with every registry request
pub const DEFAULT_USER_AGENT: &str = "package-resolver";

/// File name of the log inside [`data_dir`]
pub const LOG_FILE_NAME: &str = "package-resolver.log";

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    /// Package servers in fallback priority order
    pub servers: Vec<String>,
    pub http: HttpConfig,
    pub cache: CacheConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            servers: vec![PRIMARY_SERVER.to_string(), SECONDARY_SERVER.to_string()],
            http: HttpConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// HTTP settings shared by every registry client
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Local package cache configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Database file; `None` means [`db_path`]
    pub path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(db_path)
    }
}

/// Returns the path to the data directory for package-resolver.
/// Uses $XDG_DATA_HOME/package-resolver if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/package-resolver,
/// or ./package-resolver if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the package database file.
pub fn db_path() -> PathBuf {
    data_dir().join("packages.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(LOG_FILE_NAME)
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("package-resolver")
}
