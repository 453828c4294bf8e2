// # siip-core
//
// Core library for the SI-IP dynamic DNS updater.
//
// ## Architecture Overview
//
// - **IpResolver**: Trait for discovering the current public IPv4 address
// - **DnsProvider**: Trait for checking, creating, reading and updating an address record
// - **UpdateController**: Startup checks plus the paced poll-and-update loop
// - **ProviderRegistry**: Name-based registry of DNS provider factories
// - **Config**: Layered configuration (defaults, TOML file, environment)
//
// Concrete resolvers and providers live in their own crates and depend on
// this one; the core never depends on them.

pub mod config;
pub mod engine;
pub mod error;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use config::{AwsConfig, CloudflareConfig, Config, LogConfig, LogFormat};
pub use engine::{ControllerEvent, ControllerState, UpdateController, UpdateOutcome};
pub use error::{Error, Result};
pub use registry::ProviderRegistry;
pub use traits::{
    ChangeAction, DnsProvider, DnsProviderFactory, IpResolver, RecordChange, RecordMetadata,
};
