//! Package resolution layer
//!
//! This module provides the functionality for locating versioned packages,
//! either in the local cache or on one of several registry servers tried in
//! a fixed order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐
//! │  Resolver   │────▶│    Cache    │   cache first, no network
//! │ (fallback)  │     │  (SQLite)   │
//! └─────────────┘     └─────────────┘
//!        │
//!        ▼  one server at a time, in order
//! ┌─────────────┐     ┌─────────────┐
//! │   Factory   │────▶│  Registry   │   fetch / latest / search
//! │ (address)   │     │  (HTTP)     │
//! └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`resolver`]: Cache-first lookup with ordered server fallback
//! - [`cache`]: Local store trait and SQLite implementation
//! - [`registry`]: Registry client trait and client factory
//! - [`registries`]: Concrete registry clients (HTTP package servers)
//! - [`error`]: Error types for cache, registry and resolver operations
//! - [`types`]: Package references, search hits and fetch results
//! - [`version`]: Version parsing and latest-version selection

pub mod cache;
pub mod error;
pub mod registries;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod version;

pub use cache::{PackageCache, PackageStore};
pub use error::{CacheError, RegistryError, ResolverError};
pub use registry::{ClientFactory, RegistryClient, http_client_factory};
pub use resolver::PackageResolver;
pub use types::{CachedPackage, FetchResult, PackageInfo, PackageReference, SearchQuery};
