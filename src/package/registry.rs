//! Registry client trait for talking to a single package server

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::config::HttpConfig;
use crate::package::error::RegistryError;
use crate::package::registries::HttpRegistryClient;
use crate::package::types::{PackageInfo, PackageStream, SearchQuery};

/// Trait for fetching and searching packages on one registry server
///
/// An instance is bound to exactly one server address. Every async method
/// performs one network round trip.
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetches the package content
    ///
    /// # Returns
    /// * `Ok(PackageStream)` - The package bytes, owned by the caller
    /// * `Err(RegistryError)` - If the package is unavailable on this server
    async fn fetch(&self, id: &str, version: &str) -> Result<PackageStream, RegistryError>;

    /// Returns this server's notion of the latest version of `id`
    async fn latest_version(&self, id: &str) -> Result<String, RegistryError>;

    /// Builds the download URL for a package version without any I/O
    fn url(&self, id: &str, version: &str) -> String;

    /// Searches the server catalog
    ///
    /// Returns an empty list, not an error, when nothing matches.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<PackageInfo>, RegistryError>;
}

/// Maps a server address to a client bound to that server
pub type ClientFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn RegistryClient>, RegistryError> + Send + Sync>;

/// Creates the default factory, producing HTTP clients with the given settings
pub fn http_client_factory(http: HttpConfig) -> ClientFactory {
    Arc::new(move |address: &str| {
        let client = HttpRegistryClient::new(address, &http)?;
        Ok(Box::new(client) as Box<dyn RegistryClient>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_client_factory_rejects_blank_address() {
        let factory = http_client_factory(HttpConfig::default());

        assert!(matches!(
            factory("  "),
            Err(RegistryError::InvalidAddress(_))
        ));
    }

    #[test]
    fn http_client_factory_builds_client_bound_to_address() {
        let factory = http_client_factory(HttpConfig::default());

        let client = factory("https://packages.example.org/").unwrap();

        assert_eq!(
            client.url("hl7.fhir.r4.core", "4.0.1"),
            "https://packages.example.org/hl7.fhir.r4.core/4.0.1"
        );
    }
}
