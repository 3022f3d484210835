//! Change-detecting client for the GCE instance metadata server.
//!
//! A [`Fetcher`] long-polls the recursive metadata listing, tracks the etag of
//! the last response and decodes the body into a validated [`Snapshot`]. What
//! to do with a changed attribute is left to the caller.

pub mod attributes;
pub mod config;
pub mod errors;
pub mod etag;
pub mod fetcher;
pub mod logging;
pub mod malformed_keys;
pub mod metrics_defs;
pub mod snapshot;
pub mod windows_key;
mod wire;

#[cfg(test)]
mod testutils;

pub use attributes::Attributes;
pub use config::{Config, MetadataConfig};
pub use errors::MetadataError;
pub use fetcher::{Fetcher, Mode};
pub use malformed_keys::MalformedKeys;
pub use snapshot::{Instance, NetworkInterface, Project, Snapshot};
pub use windows_key::WindowsKey;
