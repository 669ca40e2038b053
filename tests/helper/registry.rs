//! Registry test utilities

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use package_resolver::package::{
    ClientFactory, PackageCache, PackageInfo, PackageStore, RegistryClient, RegistryError,
    SearchQuery,
};
use package_resolver::package::types::{CachedPackage, PackageStream};

/// In-memory registry for testing
#[derive(Clone, Default)]
pub struct FakeRegistry {
    address: String,
    packages: HashMap<(String, String), Vec<u8>>,
    latest: HashMap<String, String>,
    catalog: Vec<PackageInfo>,
    down: bool,
}

impl FakeRegistry {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Default::default()
        }
    }

    /// A registry whose every call fails
    pub fn down(address: &str) -> Self {
        Self {
            down: true,
            ..Self::new(address)
        }
    }

    pub fn with_package(mut self, id: &str, version: &str, content: &[u8]) -> Self {
        self.packages
            .insert((id.to_string(), version.to_string()), content.to_vec());
        self
    }

    pub fn with_latest(mut self, id: &str, version: &str) -> Self {
        self.latest.insert(id.to_string(), version.to_string());
        self
    }

    pub fn with_catalog_entry(mut self, info: PackageInfo) -> Self {
        self.catalog.push(info);
        self
    }

    fn check_up(&self) -> Result<(), RegistryError> {
        if self.down {
            return Err(RegistryError::InvalidResponse(format!(
                "{} is down",
                self.address
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn fetch(&self, id: &str, version: &str) -> Result<PackageStream, RegistryError> {
        self.check_up()?;
        match self.packages.get(&(id.to_string(), version.to_string())) {
            Some(content) => Ok(Box::pin(futures::stream::iter(vec![Ok(content.clone())]))),
            None => Err(RegistryError::NotFound(format!("{}#{}", id, version))),
        }
    }

    async fn latest_version(&self, id: &str) -> Result<String, RegistryError> {
        self.check_up()?;
        self.latest
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    fn url(&self, id: &str, version: &str) -> String {
        format!("{}/{}/{}", self.address, id, version)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<PackageInfo>, RegistryError> {
        self.check_up()?;
        Ok(self
            .catalog
            .iter()
            .filter(|info| query.id.as_ref().is_none_or(|id| info.id.starts_with(id.as_str())))
            .filter(|info| {
                query.canonical.as_ref().is_none_or(|canonical| {
                    info.canonical
                        .as_deref()
                        .is_some_and(|c| c.starts_with(canonical.as_str()))
                })
            })
            .cloned()
            .collect())
    }
}

/// A set of fake registries keyed by address, recording every client built
#[derive(Clone, Default)]
pub struct FakeServers {
    registries: Arc<Mutex<HashMap<String, FakeRegistry>>>,
    built: Arc<Mutex<Vec<String>>>,
}

impl FakeServers {
    pub fn new(registries: Vec<FakeRegistry>) -> Self {
        let servers = Self::default();
        {
            let mut map = servers.registries.lock().unwrap();
            for registry in registries {
                map.insert(registry.address.clone(), registry);
            }
        }
        servers
    }

    /// Factory that builds clients for known addresses and fails for others
    pub fn factory(&self) -> ClientFactory {
        let servers = self.clone();
        Arc::new(move |address: &str| {
            servers.built.lock().unwrap().push(address.to_string());
            match servers.registries.lock().unwrap().get(address) {
                Some(registry) => Ok(Box::new(registry.clone()) as Box<dyn RegistryClient>),
                None => Err(RegistryError::InvalidAddress(address.to_string())),
            }
        })
    }

    /// Addresses for which a client was built, in order
    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }
}

/// Create a test cache with pre-installed packages
pub fn create_test_cache(packages: &[(&str, &str, Option<&str>)]) -> (TempDir, Arc<PackageCache>) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let cache = PackageCache::new(&db_path).unwrap();

    for (id, version, canonical) in packages {
        cache
            .install(CachedPackage {
                id: id.to_string(),
                version: version.to_string(),
                canonical: canonical.map(str::to_string),
                source_url: None,
                content: format!("{}#{}", id, version).into_bytes(),
                installed_at: 0,
            })
            .unwrap();
    }

    (temp_dir, Arc::new(cache))
}
