//! Package resolution against a local cache and an ordered list of registry servers.
//!
//! See [`package`] for the resolution layer and [`config`] for settings.

pub mod config;
pub mod package;
