//! Registry client implementations

pub mod http;

pub use http::HttpRegistryClient;
