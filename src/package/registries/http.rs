//! HTTP package server client (npm-style FHIR package registries)

use std::collections::HashMap;
use std::time::Duration;

use futures::TryStreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::package::error::RegistryError;
use crate::package::registry::RegistryClient;
use crate::package::types::{PackageInfo, PackageStream, SearchQuery};

/// Package document returned by `GET {server}/{id}`
#[derive(Debug, Deserialize)]
struct PackageDocument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
}

/// Entry of the `GET {server}/catalog` response
///
/// Servers disagree on field casing, so both spellings are accepted.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(alias = "Name")]
    name: Option<String>,
    #[serde(alias = "Canonical")]
    canonical: Option<String>,
    #[serde(alias = "Version")]
    version: Option<String>,
    #[serde(rename = "fhirVersion", alias = "FHIRVersion", alias = "FhirVersion")]
    fhir_version: Option<String>,
    #[serde(alias = "Description")]
    description: Option<String>,
    url: Option<String>,
}

impl CatalogEntry {
    fn into_package_info(self) -> Option<PackageInfo> {
        Some(PackageInfo {
            id: self.name?,
            canonical: self.canonical,
            version: self.version,
            fhir_version: self.fhir_version,
            description: self.description,
            url: self.url,
        })
    }
}

/// Registry client bound to one HTTP package server
#[derive(Clone)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    address: String,
}

impl HttpRegistryClient {
    /// Creates a client for `address`; trailing slashes are ignored
    pub fn new(address: &str, http: &HttpConfig) -> Result<Self, RegistryError> {
        let address = address.trim().trim_end_matches('/');
        if address.is_empty() {
            return Err(RegistryError::InvalidAddress(
                "server address must not be blank".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .user_agent(http.user_agent.as_str())
            .timeout(Duration::from_millis(http.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            address: address.to_string(),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn get(&self, url: reqwest::Url, what: &str) -> Result<reqwest::Response, RegistryError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(what.to_string()));
        }

        if !status.is_success() {
            warn!("Package server returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        Ok(response)
    }

    fn parse_url(url: &str) -> Result<reqwest::Url, RegistryError> {
        reqwest::Url::parse(url)
            .map_err(|e| RegistryError::InvalidAddress(format!("{}: {}", url, e)))
    }
}

#[async_trait::async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn fetch(&self, id: &str, version: &str) -> Result<PackageStream, RegistryError> {
        let url = Self::parse_url(&self.url(id, version))?;
        let response = self.get(url, &format!("{}#{}", id, version)).await?;

        let stream = response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(RegistryError::from);

        Ok(Box::pin(stream))
    }

    async fn latest_version(&self, id: &str) -> Result<String, RegistryError> {
        let url = Self::parse_url(&format!("{}/{}", self.address, id))?;
        let response = self.get(url, id).await?;

        let document: PackageDocument = response.json().await.map_err(|e| {
            warn!("Failed to parse package document for {}: {}", id, e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        document
            .dist_tags
            .get("latest")
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("{} (no latest version)", id)))
    }

    fn url(&self, id: &str, version: &str) -> String {
        format!("{}/{}/{}", self.address, id, version)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<PackageInfo>, RegistryError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(id) = &query.id {
            params.push(("name", id.as_str()));
        }
        if let Some(canonical) = &query.canonical {
            params.push(("canonical", canonical.as_str()));
        }
        if let Some(fhir_version) = &query.fhir_version {
            params.push(("fhirversion", fhir_version.as_str()));
        }
        if query.pre_release {
            params.push(("prerelease", "true"));
        }

        let url = reqwest::Url::parse_with_params(&format!("{}/catalog", self.address), &params)
            .map_err(|e| RegistryError::InvalidAddress(format!("{}: {}", self.address, e)))?;

        let entries: Vec<CatalogEntry> = match self.get(url, "catalog").await {
            Ok(response) => response.json().await.map_err(|e| {
                warn!("Failed to parse catalog response from {}: {}", self.address, e);
                RegistryError::InvalidResponse(e.to_string())
            })?,
            // A server without matches may answer 404 instead of an empty list
            Err(RegistryError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        Ok(entries
            .into_iter()
            .filter_map(CatalogEntry::into_package_info)
            .collect())
    }
}
