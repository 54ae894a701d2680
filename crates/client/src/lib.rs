//! Client-side inventory of the wine cellar.
//!
//! This crate provides:
//! - The remote gateway boundary (REST API and an in-process implementation)
//! - The inventory store that owns the local collection and keeps it consistent
//!   with the server
//! - Configuration for the `cellar` command-line tool
//!
//! The REST API remains the authority; the store never invents ids and only
//! merges records the server has returned in full.

pub mod config;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod store;

pub use config::{ClientConfig, ConfigError};
pub use gateway::{GatewayError, RatingSummary, RemoteGateway};
pub use http::HttpGateway;
pub use memory::{GatewayCall, InMemoryGateway};
pub use store::{InventoryStore, LoadOutcome, Snapshot, StoreError, StoreLifecycle};
