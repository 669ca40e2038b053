//! Package resolution across the local cache and an ordered list of servers
//!
//! Every public operation is a single serial pass over a snapshot of the
//! server list that stops at the first success. A server that cannot be
//! reached, or that fails mid-attempt, is logged and skipped; running out of
//! servers is reported as `None`, never as an error.

use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexSet;
use tracing::{debug, info};

use crate::package::cache::PackageStore;
use crate::package::error::{RegistryError, ResolverError};
use crate::package::registry::ClientFactory;
use crate::package::types::{
    CachedPackage, FetchResult, PackageInfo, PackageReference, SearchQuery, normalize_version,
};

/// Resolves packages from a [`PackageStore`] first and registry servers second
pub struct PackageResolver<S: PackageStore> {
    store: Arc<S>,
    servers: RwLock<IndexSet<String>>,
    factory: RwLock<ClientFactory>,
}

impl<S: PackageStore> PackageResolver<S> {
    /// Create a resolver with no servers configured
    pub fn new(store: Arc<S>, factory: ClientFactory) -> Self {
        Self {
            store,
            servers: RwLock::new(IndexSet::new()),
            factory: RwLock::new(factory),
        }
    }

    /// Add every server in order, skipping duplicates
    pub fn with_servers<I, T>(self, servers: I) -> Result<Self, ResolverError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for server in servers {
            self.add_server(server.as_ref())?;
        }
        Ok(self)
    }

    /// Append a server to the fallback list unless it is already present
    ///
    /// Addresses are compared as exact strings. No reachability check is made.
    pub fn add_server(&self, address: &str) -> Result<(), ResolverError> {
        if address.trim().is_empty() {
            return Err(ResolverError::InvalidArgument(
                "server address must not be blank".to_string(),
            ));
        }

        let mut servers = self.servers.write().unwrap_or_else(PoisonError::into_inner);
        if servers.insert(address.to_string()) {
            debug!("Added package server {}", address);
        }
        Ok(())
    }

    /// The configured servers in fallback order
    pub fn servers(&self) -> Vec<String> {
        self.servers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Replace the factory used to build registry clients
    pub fn set_client_factory(&self, factory: ClientFactory) {
        *self.factory.write().unwrap_or_else(PoisonError::into_inner) = factory;
    }

    /// Copy of the server list and factory, taken once per resolution call
    /// so that concurrent `add_server` calls cannot change the iteration
    fn snapshot(&self) -> (Vec<String>, ClientFactory) {
        let factory = self
            .factory
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        (self.servers(), factory)
    }

    /// Look a package up in the local store only
    pub fn load_from_cache_only(
        &self,
        id: &str,
        version: Option<&str>,
    ) -> Result<Option<CachedPackage>, ResolverError> {
        Ok(self.store.load_cached(id, normalize_version(version))?)
    }

    /// Fetch a package from the first server that can deliver it
    ///
    /// Without a version, each server is asked for its own latest version
    /// before fetching, so two servers may resolve to different versions.
    pub async fn resolve_from_servers(&self, id: &str, version: Option<&str>) -> Option<FetchResult> {
        let (servers, factory) = self.snapshot();
        let version = normalize_version(version);

        for server in &servers {
            match fetch_from_server(&factory, server, id, version).await {
                Ok(result) => {
                    info!("Resolved {}#{} from {}", id, result.version, server);
                    return Some(result);
                }
                Err(e) => {
                    info!(
                        "Failed to resolve package {}#{} from server {}: {}",
                        id,
                        version.unwrap_or("latest"),
                        server,
                        e
                    );
                }
            }
        }

        debug!("Package {} not available on any of {} servers", id, servers.len());
        None
    }

    /// Find the URL of a package
    ///
    /// A cached package answers with its canonical URL, possibly none,
    /// without touching the network. Otherwise the first search hit on the
    /// first server with any hit wins.
    pub async fn get_package_url(&self, id: &str) -> Result<Option<String>, ResolverError> {
        if let Some(package) = self.load_from_cache_only(id, None)? {
            debug!("Answering URL of {} from cached {}", id, package.version);
            return Ok(package.canonical);
        }

        let (servers, factory) = self.snapshot();
        let query = SearchQuery::by_id(id);

        for server in &servers {
            match search_server(&factory, server, &query).await {
                Ok(results) => {
                    if let Some(url) = results.into_iter().next().and_then(|info| info.url) {
                        return Ok(Some(url));
                    }
                }
                Err(e) => info!("Failed to search {} for package {}: {}", server, id, e),
            }
        }

        Ok(None)
    }

    /// Find the package id that owns a canonical URL
    ///
    /// The first server returning any hit decides: an exact canonical match
    /// is preferred, otherwise its first hit is used. Later servers are not
    /// consulted even if they might have an exact match.
    pub async fn get_package_id(&self, canonical: &str) -> Option<String> {
        let (servers, factory) = self.snapshot();
        let query = SearchQuery::by_canonical(canonical);

        for server in &servers {
            match search_server(&factory, server, &query).await {
                Ok(results) => {
                    if let Some(id) = pick_by_canonical(canonical, results) {
                        return Some(id);
                    }
                }
                Err(e) => info!("Failed to search {} for canonical {}: {}", server, canonical, e),
            }
        }

        None
    }

    /// Load a package from the cache, or fetch it from the servers and
    /// install it into the cache
    pub async fn load_package(
        &self,
        reference: &PackageReference,
    ) -> Result<Option<CachedPackage>, ResolverError> {
        let version = normalize_version(reference.version.as_deref());

        if let Some(package) = self.load_from_cache_only(&reference.id, version)? {
            debug!("Loaded {}#{} from cache", package.id, package.version);
            return Ok(Some(package));
        }

        let Some(fetched) = self.resolve_from_servers(&reference.id, version).await else {
            return Ok(None);
        };

        let source_url = fetched.url.clone();
        let resolved_version = fetched.version.clone();
        let content = fetched.into_bytes().await?;
        let canonical = self.find_canonical(&reference.id).await;

        let package = self.store.install(CachedPackage {
            id: reference.id.clone(),
            version: resolved_version,
            canonical,
            source_url: Some(source_url),
            content,
            installed_at: 0,
        })?;

        Ok(Some(package))
    }

    /// Canonical URL of a package id according to the servers
    async fn find_canonical(&self, id: &str) -> Option<String> {
        let (servers, factory) = self.snapshot();
        let query = SearchQuery::by_id(id);

        for server in &servers {
            match search_server(&factory, server, &query).await {
                Ok(results) => {
                    if let Some(canonical) = pick_by_id(id, results) {
                        return Some(canonical);
                    }
                }
                Err(e) => info!("Failed to look up canonical of {} on {}: {}", id, server, e),
            }
        }

        debug!("No canonical URL known for {}", id);
        None
    }
}

async fn fetch_from_server(
    factory: &ClientFactory,
    server: &str,
    id: &str,
    version: Option<&str>,
) -> Result<FetchResult, RegistryError> {
    let client = factory(server)?;

    let version = match version {
        Some(version) => version.to_string(),
        None => client.latest_version(id).await?,
    };

    let stream = client.fetch(id, &version).await?;
    let url = client.url(id, &version);

    Ok(FetchResult {
        stream,
        url,
        version,
    })
}

async fn search_server(
    factory: &ClientFactory,
    server: &str,
    query: &SearchQuery,
) -> Result<Vec<PackageInfo>, RegistryError> {
    let client = factory(server)?;
    client.search(query).await
}

/// Id of the hit whose canonical equals `canonical`, else of the first hit
fn pick_by_canonical(canonical: &str, results: Vec<PackageInfo>) -> Option<String> {
    let index = results
        .iter()
        .position(|info| info.canonical.as_deref() == Some(canonical))
        .unwrap_or(0);
    results.into_iter().nth(index).map(|info| info.id)
}

/// Canonical of the hit whose id equals `id`, else of the first hit that has one
fn pick_by_id(id: &str, results: Vec<PackageInfo>) -> Option<String> {
    let index = results
        .iter()
        .position(|info| info.id == id && info.canonical.is_some())
        .or_else(|| results.iter().position(|info| info.canonical.is_some()))?;
    results.into_iter().nth(index).and_then(|info| info.canonical)
}
