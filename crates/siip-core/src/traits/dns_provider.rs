// # DNS Provider Trait
//
// Defines the capability set the controller needs from a DNS hosting
// service: check, create, read and update a single address record.
//
// ## Implementations
//
// - AWS Route 53: `siip-provider-route53` crate (provider name `aws`)
// - Cloudflare: `siip-provider-cloudflare` crate (provider name `cloudflare`)
//
// ## Shape
//
// Implementations supply two fallible primitives, `fetch_record()` and
// `apply_change()`. The four controller-facing operations are provided
// on top of them and never propagate errors: failures are logged and
// reported as `false` / absent.

use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;

/// Current state of an address record at the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    /// Record name as reported by the provider (trailing dot stripped)
    pub name: String,
    /// Published address, if the record carries a parseable one
    pub ip: Option<Ipv4Addr>,
    /// Time-to-live for the record
    pub ttl: Option<u32>,
}

/// Kind of change submitted to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    /// Create a new record; fails if it already exists
    Create,
    /// Create or replace the record value
    Upsert,
}

impl ChangeAction {
    /// Wire name of the action (`CREATE` / `UPSERT`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Upsert => "UPSERT",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-record change batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub action: ChangeAction,
    pub name: String,
    pub ip: Ipv4Addr,
    pub ttl: u32,
}

impl RecordChange {
    pub fn create(name: impl Into<String>, ip: Ipv4Addr, ttl: u32) -> Self {
        Self {
            action: ChangeAction::Create,
            name: name.into(),
            ip,
            ttl,
        }
    }

    pub fn upsert(name: impl Into<String>, ip: Ipv4Addr, ttl: u32) -> Self {
        Self {
            action: ChangeAction::Upsert,
            name: name.into(),
            ip,
            ttl,
        }
    }
}

/// Strip a single trailing dot so `host.example.com.` matches `host.example.com`
pub fn normalize_record_name(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// Providers execute single API calls against their endpoint. They do not
/// retry, schedule, or decide whether an update is needed; that is owned
/// by the `UpdateController`.
///
/// # Error collapsing
///
/// `record_exists()` reports `false` when the lookup itself failed, the
/// same as when the record is confirmed absent. The failure is logged at
/// error level with `operation = "check_record"` so the two cases can be
/// told apart in the logs. Callers that need the distinction use
/// `fetch_record()` directly.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the address record for `name`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(RecordMetadata))`: The record exists
    /// - `Ok(None)`: No address record with that name exists
    /// - `Err(Error)`: The lookup could not be performed
    async fn fetch_record(&self, name: &str) -> Result<Option<RecordMetadata>, crate::Error>;

    /// Submit one CREATE or UPSERT change
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: Provider-specific change or record id
    /// - `Err(Error)`: The provider rejected the change
    async fn apply_change(&self, change: &RecordChange) -> Result<String, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;

    /// Whether an address record named `name` exists
    async fn record_exists(&self, name: &str) -> bool {
        match self.fetch_record(name).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                tracing::error!(
                    operation = "check_record",
                    provider = self.provider_name(),
                    record_name = name,
                    error = %e,
                    "Failed to check record"
                );
                false
            }
        }
    }

    /// Create the address record; `false` on failure
    async fn create_record(&self, name: &str, ip: Ipv4Addr, ttl: u32) -> bool {
        let change = RecordChange::create(name, ip, ttl);
        match self.apply_change(&change).await {
            Ok(change_id) => {
                tracing::info!(
                    operation = "create_record",
                    provider = self.provider_name(),
                    record_name = name,
                    ip = %ip,
                    change_id = %change_id,
                    "Created DNS record"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    operation = "create_record",
                    provider = self.provider_name(),
                    record_name = name,
                    ip = %ip,
                    error = %e,
                    "Failed to create record"
                );
                false
            }
        }
    }

    /// Upsert the address record value; `false` on failure
    async fn update_record(&self, name: &str, ip: Ipv4Addr, ttl: u32) -> bool {
        let change = RecordChange::upsert(name, ip, ttl);
        match self.apply_change(&change).await {
            Ok(change_id) => {
                tracing::info!(
                    operation = "update_record",
                    provider = self.provider_name(),
                    record_name = name,
                    ip = %ip,
                    change_id = %change_id,
                    "Updated DNS record"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    operation = "update_record",
                    provider = self.provider_name(),
                    record_name = name,
                    ip = %ip,
                    error = %e,
                    "Failed to update record"
                );
                false
            }
        }
    }

    /// Currently published address, absent if no matching record is found
    async fn get_record_ip(&self, name: &str) -> Option<Ipv4Addr> {
        match self.fetch_record(name).await {
            Ok(record) => record.and_then(|r| r.ip),
            Err(e) => {
                tracing::error!(
                    operation = "get_record_ip",
                    provider = self.provider_name(),
                    record_name = name,
                    error = %e,
                    "Failed to get record IP"
                );
                None
            }
        }
    }
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(&self, config: &crate::config::Config) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
