//! Core traits for SI-IP
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpResolver`]: Discover the current public IPv4 address
//! - [`DnsProvider`]: Check, create, read and update an address record

pub mod dns_provider;
pub mod ip_resolver;

pub use dns_provider::{
    ChangeAction, DnsProvider, DnsProviderFactory, RecordChange, RecordMetadata,
    normalize_record_name,
};
pub use ip_resolver::IpResolver;
