// # Cloudflare DNS Provider
//
// DnsProvider implementation for Cloudflare API v4, registered under the
// provider name `cloudflare`.
//
// ## Scope
//
// - One A record in one pre-configured zone
// - Single-shot API calls; no retry, backoff or caching (owned by the
//   UpdateController's poll cadence)
// - HTTP timeout configured (30 seconds)
// - Specific error mapping for HTTP status codes (401/403, 404, 409, 429, 5xx)
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider fails fast if the token or zone id is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use serde::Deserialize;
use siip_core::config::Config;
use siip_core::traits::{
    DnsProvider, DnsProviderFactory, RecordChange, RecordMetadata, normalize_record_name,
};
use siip_core::{ChangeAction, Error, ProviderRegistry, Result};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// Envelope around every API v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    content: String,
    ttl: Option<u32>,
}

/// Cloudflare DNS provider
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone holding the record
    zone_id: String,

    /// API base URL, overridable for tests
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Zone holding the record
    ///
    /// # Security
    ///
    /// The API token will NEVER be logged or displayed in error messages.
    pub fn new(api_token: impl Into<String>, zone_id: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into();
        let zone_id = zone_id.into();

        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }
        if zone_id.is_empty() {
            return Err(Error::config("Cloudflare zone id cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            zone_id,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at another API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, self.zone_id)
    }

    /// Look up the A record for `name`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=host.example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn find_record(&self, name: &str) -> Result<Option<DnsRecord>> {
        let wanted = normalize_record_name(name);
        tracing::debug!(provider = PROVIDER, record_name = wanted, "Looking up DNS record");

        let response = self
            .client
            .get(self.records_url())
            .query(&[("type", "A"), ("name", wanted)])
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let records: Vec<DnsRecord> = parse_response(response, "Record lookup").await?;

        Ok(records.into_iter().find(|record| {
            record.record_type == "A"
                && normalize_record_name(&record.name).eq_ignore_ascii_case(wanted)
        }))
    }

    /// Create an A record
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 300}
    /// ```
    async fn create(&self, change: &RecordChange) -> Result<String> {
        let payload = record_payload(change);

        let response = self
            .client
            .post(self.records_url())
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let record: DnsRecord = parse_response(response, "Failed to create record").await?;
        Ok(record.id)
    }

    /// Overwrite an existing record
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 300}
    /// ```
    async fn replace(&self, record_id: &str, change: &RecordChange) -> Result<String> {
        let payload = record_payload(change);

        let response = self
            .client
            .put(format!("{}/{}", self.records_url(), record_id))
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let record: DnsRecord = parse_response(response, "Failed to update record").await?;
        Ok(record.id)
    }
}

fn record_payload(change: &RecordChange) -> serde_json::Value {
    serde_json::json!({
        "type": "A",
        "name": normalize_record_name(&change.name),
        "content": change.ip.to_string(),
        "ttl": change.ttl,
    })
}

/// Map an API response to its `result`, or to a provider error
async fn parse_response<T>(response: reqwest::Response, context: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        let message = match status.as_u16() {
            401 | 403 => format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                status
            ),
            404 => format!("Not found: {} - {}", status, error_text),
            409 => format!(
                "Conflict: Record is being updated by another process. Status: {}",
                status
            ),
            429 => format!("Rate limit exceeded. Please retry later. Status: {}", status),
            500..=599 => format!(
                "Cloudflare server error (transient): {} - {}",
                status, error_text
            ),
            _ => format!("{}: {} - {}", context, status, error_text),
        };
        return Err(Error::provider(PROVIDER, message));
    }

    let body: ApiResponse<T> = response
        .json()
        .await
        .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

    if !body.success {
        let messages: Vec<String> = body
            .errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect();
        return Err(Error::provider(
            PROVIDER,
            format!("{}: {}", context, messages.join("; ")),
        ));
    }

    body.result
        .ok_or_else(|| Error::provider(PROVIDER, "Invalid response format: missing result"))
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn fetch_record(&self, name: &str) -> Result<Option<RecordMetadata>> {
        let record = self.find_record(name).await?;

        Ok(record.map(|record| RecordMetadata {
            name: normalize_record_name(&record.name).to_string(),
            ip: record.content.trim().parse().ok(),
            ttl: record.ttl,
        }))
    }

    async fn apply_change(&self, change: &RecordChange) -> Result<String> {
        match change.action {
            ChangeAction::Create => self.create(change).await,
            ChangeAction::Upsert => match self.find_record(&change.name).await? {
                Some(existing) => {
                    tracing::debug!(
                        provider = PROVIDER,
                        record_name = %change.name,
                        old_ip = %existing.content,
                        new_ip = %change.ip,
                        "Replacing existing DNS record"
                    );
                    self.replace(&existing.id, change).await
                }
                None => self.create(change).await,
            },
        }
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &Config) -> Result<Box<dyn DnsProvider>> {
        let cf = &config.cloudflare;
        Ok(Box::new(CloudflareProvider::new(
            cf.api_token.clone(),
            cf.zone_id.clone(),
        )?))
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use siip_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// siip_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider(PROVIDER, Box::new(CloudflareFactory));
}
