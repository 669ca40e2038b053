//! Common types for package resolution

use std::fmt;
use std::pin::Pin;

use futures::{Stream, TryStreamExt};

use crate::package::error::{RegistryError, ResolverError};

/// Byte stream of a fetched package, delivered in chunks
pub type PackageStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, RegistryError>> + Send>>;

/// A package identifier with an optional version
///
/// A missing version means "whatever the server reports as latest".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageReference {
    pub id: String,
    pub version: Option<String>,
}

impl PackageReference {
    /// Creates a reference, treating a blank version as absent
    pub fn new(id: impl Into<String>, version: Option<&str>) -> Self {
        Self {
            id: id.into(),
            version: normalize_version(version).map(str::to_string),
        }
    }

    /// Parse `id` or `id#version`
    ///
    /// Examples:
    /// - "hl7.fhir.us.core" -> id only, latest version
    /// - "hl7.fhir.us.core#6.1.0" -> id and version
    pub fn parse(reference: &str) -> Result<Self, ResolverError> {
        let (id, version) = match reference.split_once('#') {
            Some((id, version)) => (id.trim(), Some(version.trim())),
            None => (reference.trim(), None),
        };

        if id.is_empty() {
            return Err(ResolverError::InvalidArgument(format!(
                "package reference '{}' has no id",
                reference
            )));
        }

        Ok(Self::new(id, version))
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}#{}", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Returns `None` for a missing or blank version string
pub fn normalize_version(version: Option<&str>) -> Option<&str> {
    version.map(str::trim).filter(|v| !v.is_empty())
}

/// A registry search hit
///
/// Several entries may share an id or a canonical URL; the order of a search
/// result is whatever the registry returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub id: String,
    pub canonical: Option<String>,
    pub version: Option<String>,
    pub fhir_version: Option<String>,
    pub description: Option<String>,
    /// Where the package can be downloaded from
    pub url: Option<String>,
}

impl PackageInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_canonical(mut self, canonical: impl Into<String>) -> Self {
        self.canonical = Some(canonical.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Search criteria sent to a registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub id: Option<String>,
    pub canonical: Option<String>,
    pub fhir_version: Option<String>,
    pub pre_release: bool,
}

impl SearchQuery {
    pub fn by_id(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Default::default()
        }
    }

    pub fn by_canonical(canonical: &str) -> Self {
        Self {
            canonical: Some(canonical.to_string()),
            ..Default::default()
        }
    }
}

/// A package stream together with where it came from
///
/// The caller owns the stream; dropping the result releases it.
pub struct FetchResult {
    pub stream: PackageStream,
    /// Download URL reported by the serving registry
    pub url: String,
    /// The version actually resolved by the serving registry
    pub version: String,
}

impl FetchResult {
    /// Drain the stream into a single buffer
    pub async fn into_bytes(self) -> Result<Vec<u8>, RegistryError> {
        self.stream.try_concat().await
    }
}

impl fmt::Debug for FetchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResult")
            .field("url", &self.url)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A package materialized in the local store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPackage {
    pub id: String,
    pub version: String,
    pub canonical: Option<String>,
    pub source_url: Option<String>,
    pub content: Vec<u8>,
    /// Milliseconds since UNIX epoch
    pub installed_at: i64,
}

impl CachedPackage {
    pub fn canonical(&self) -> Option<&str> {
        self.canonical.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("hl7.fhir.us.core", "hl7.fhir.us.core", None)]
    #[case("hl7.fhir.us.core#6.1.0", "hl7.fhir.us.core", Some("6.1.0"))]
    #[case("hl7.fhir.us.core#", "hl7.fhir.us.core", None)]
    #[case(" hl7.fhir.r4.core # 4.0.1 ", "hl7.fhir.r4.core", Some("4.0.1"))]
    fn parse_returns_expected(
        #[case] input: &str,
        #[case] id: &str,
        #[case] version: Option<&str>,
    ) {
        let reference = PackageReference::parse(input).unwrap();
        assert_eq!(reference.id, id);
        assert_eq!(reference.version.as_deref(), version);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("#1.0.0")]
    fn parse_rejects_missing_id(#[case] input: &str) {
        assert!(matches!(
            PackageReference::parse(input),
            Err(ResolverError::InvalidArgument(_))
        ));
    }

    #[test]
    fn display_includes_version_only_when_present() {
        assert_eq!(
            PackageReference::new("a.b", Some("1.0.0")).to_string(),
            "a.b#1.0.0"
        );
        assert_eq!(PackageReference::new("a.b", Some("  ")).to_string(), "a.b");
    }

    #[tokio::test]
    async fn into_bytes_concatenates_chunks() {
        let result = FetchResult {
            stream: Box::pin(futures::stream::iter(vec![
                Ok(b"abc".to_vec()),
                Ok(b"def".to_vec()),
            ])),
            url: "http://server/a/1.0.0".to_string(),
            version: "1.0.0".to_string(),
        };

        assert_eq!(result.into_bytes().await.unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn into_bytes_propagates_stream_error() {
        let result = FetchResult {
            stream: Box::pin(futures::stream::iter(vec![
                Ok(b"abc".to_vec()),
                Err(RegistryError::InvalidResponse("truncated".to_string())),
            ])),
            url: "http://server/a/1.0.0".to_string(),
            version: "1.0.0".to_string(),
        };

        assert!(result.into_bytes().await.is_err());
    }
}
