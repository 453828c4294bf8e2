// # AWS Route 53 DNS Provider
//
// DnsProvider implementation for Amazon Route 53, registered under the
// provider name `aws`.
//
// ## API Reference
//
// - Route 53 REST API, version 2013-04-01, signed with AWS Signature V4
// - List record sets: GET `/2013-04-01/hostedzone/{zone}/rrset?name=...&type=A&maxitems=1`
// - Change record sets: POST `/2013-04-01/hostedzone/{zone}/rrset/`
//
// ## Security Requirements
//
// - The secret access key NEVER appears in logs or Debug output
// - Credentials come from configuration only

mod sign;
mod types;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use siip_core::config::Config;
use siip_core::traits::{
    DnsProvider, DnsProviderFactory, RecordChange, RecordMetadata, normalize_record_name,
};
use siip_core::{ChangeAction, Error, ProviderRegistry, Result};
use std::time::Duration;

use sign::Signer;
use types::{
    Change, ChangeBatch, ChangeList, ChangeResourceRecordSetsRequest,
    ChangeResourceRecordSetsResponse, ErrorResponse, ListResourceRecordSetsResponse,
    ResourceRecord, ResourceRecordList, ResourceRecordSet, XMLNS,
};

/// Route 53 global endpoint
pub const ROUTE53_ENDPOINT: &str = "https://route53.amazonaws.com";

const API_VERSION: &str = "2013-04-01";
const SIGNING_REGION: &str = "us-east-1";
const SIGNING_SERVICE: &str = "route53";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "route53";

/// Route 53 DNS provider
///
/// Stateless apart from its credentials; every operation is a single
/// signed API call.
pub struct Route53Provider {
    access_key_id: String,

    /// ⚠️ NEVER log this value
    secret_access_key: String,

    /// Bare zone id (no `/hostedzone/` prefix)
    hosted_zone_id: String,

    /// API endpoint, overridable for tests
    endpoint: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the secret key
impl std::fmt::Debug for Route53Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route53Provider")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<REDACTED>")
            .field("hosted_zone_id", &self.hosted_zone_id)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Route53Provider {
    /// Create a new Route 53 provider
    ///
    /// # Parameters
    ///
    /// - `access_key_id`, `secret_access_key`: IAM credentials with
    ///   `route53:ListResourceRecordSets` and `route53:ChangeResourceRecordSets`
    /// - `hosted_zone_id`: Zone holding the record, with or without the
    ///   `/hostedzone/` prefix
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        hosted_zone_id: impl AsRef<str>,
    ) -> Result<Self> {
        let access_key_id = access_key_id.into();
        let secret_access_key = secret_access_key.into();
        let hosted_zone_id = normalize_zone_id(hosted_zone_id.as_ref());

        if access_key_id.is_empty() || secret_access_key.is_empty() {
            return Err(Error::config("Route 53 credentials are required"));
        }
        if hosted_zone_id.is_empty() {
            return Err(Error::config("Route 53 hosted zone id is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            hosted_zone_id,
            endpoint: ROUTE53_ENDPOINT.to_string(),
            client,
        })
    }

    /// Point the provider at another endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn hosted_zone_id(&self) -> &str {
        &self.hosted_zone_id
    }

    fn rrset_path(&self) -> String {
        format!("/{}/hostedzone/{}/rrset", API_VERSION, self.hosted_zone_id)
    }

    /// `host[:port]` of the endpoint, as sent in the Host header
    fn endpoint_host(&self) -> Result<String> {
        let url = reqwest::Url::parse(&self.endpoint)
            .map_err(|e| Error::config(format!("Invalid Route 53 endpoint: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::config("Route 53 endpoint has no host"))?;

        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// Send one signed request and return the response body
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: String,
    ) -> Result<String> {
        let amz_date = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let headers = vec![
            ("host".to_string(), self.endpoint_host()?),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];

        let signer = Signer {
            access_key_id: &self.access_key_id,
            secret_access_key: &self.secret_access_key,
            region: SIGNING_REGION,
            service: SIGNING_SERVICE,
        };
        let authorization =
            signer.authorization(method.as_str(), path, query, &headers, &body, &amz_date);

        let query_string = sign::canonical_query(query);
        let url = if query_string.is_empty() {
            format!("{}{}", self.endpoint, path)
        } else {
            format!("{}{}?{}", self.endpoint, path, query_string)
        };

        let mut request = self
            .client
            .request(method, &url)
            .header("x-amz-date", &amz_date)
            .header("authorization", authorization);
        if !body.is_empty() {
            request = request.header("content-type", "application/xml").body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("Route 53 request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Route 53 response: {}", e)))?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }

        Ok(text)
    }
}

/// Strip the `/hostedzone/` prefix the console and API sometimes include
fn normalize_zone_id(zone_id: &str) -> String {
    let zone_id = zone_id.trim();
    zone_id
        .strip_prefix("/hostedzone/")
        .unwrap_or(zone_id)
        .to_string()
}

fn api_error(status: StatusCode, body: &str) -> Error {
    match quick_xml::de::from_str::<ErrorResponse>(body) {
        Ok(parsed) => Error::provider(
            PROVIDER,
            format!("{}: {}", parsed.error.code, parsed.error.message),
        ),
        Err(_) => {
            let snippet: String = body.chars().take(200).collect();
            Error::provider(PROVIDER, format!("HTTP {}: {}", status, snippet))
        }
    }
}

fn change_comment(action: ChangeAction) -> &'static str {
    match action {
        ChangeAction::Create => "Initial DNS record creation",
        ChangeAction::Upsert => "Automatic DNS update",
    }
}

#[async_trait]
impl DnsProvider for Route53Provider {
    async fn fetch_record(&self, name: &str) -> Result<Option<RecordMetadata>> {
        let body = self
            .send(
                Method::GET,
                &self.rrset_path(),
                &[("maxitems", "1"), ("name", name), ("type", "A")],
                String::new(),
            )
            .await?;

        let listing: ListResourceRecordSetsResponse = quick_xml::de::from_str(&body)
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        let wanted = normalize_record_name(name);
        let record = listing
            .resource_record_sets
            .items
            .into_iter()
            .find(|set| {
                set.record_type == "A"
                    && normalize_record_name(&set.name).eq_ignore_ascii_case(wanted)
            })
            .map(|set| RecordMetadata {
                name: normalize_record_name(&set.name).to_string(),
                ip: set
                    .resource_records
                    .items
                    .first()
                    .and_then(|r| r.value.trim().parse().ok()),
                ttl: set.ttl,
            });

        tracing::debug!(
            provider = PROVIDER,
            record_name = name,
            found = record.is_some(),
            "Route 53 record lookup"
        );
        Ok(record)
    }

    async fn apply_change(&self, change: &RecordChange) -> Result<String> {
        let request = ChangeResourceRecordSetsRequest {
            xmlns: XMLNS,
            change_batch: ChangeBatch {
                comment: change_comment(change.action).to_string(),
                changes: ChangeList {
                    items: vec![Change {
                        action: change.action.as_str(),
                        resource_record_set: ResourceRecordSet {
                            name: change.name.clone(),
                            record_type: "A".to_string(),
                            ttl: Some(change.ttl),
                            resource_records: ResourceRecordList {
                                items: vec![ResourceRecord {
                                    value: change.ip.to_string(),
                                }],
                            },
                        },
                    }],
                },
            },
        };

        let xml = quick_xml::se::to_string(&request)
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to encode change: {}", e)))?;
        let payload = format!(r#"<?xml version="1.0" encoding="UTF-8"?>{}"#, xml);

        let path = format!("{}/", self.rrset_path());
        let body = self.send(Method::POST, &path, &[], payload).await?;

        let response: ChangeResourceRecordSetsResponse = quick_xml::de::from_str(&body)
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        tracing::debug!(
            provider = PROVIDER,
            action = %change.action,
            change_id = %response.change_info.id,
            status = %response.change_info.status,
            "Route 53 change submitted"
        );
        Ok(response.change_info.id)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Factory for creating Route 53 providers
pub struct Route53Factory;

impl DnsProviderFactory for Route53Factory {
    fn create(&self, config: &Config) -> Result<Box<dyn DnsProvider>> {
        let aws = &config.aws;
        let provider = Route53Provider::new(
            aws.aws_access_key_id.clone(),
            aws.aws_secret_access_key.clone(),
            &aws.hosted_zone_id,
        )?;

        tracing::debug!(
            provider = PROVIDER,
            hosted_zone_id = provider.hosted_zone_id(),
            "Route 53 provider created"
        );
        Ok(Box::new(provider))
    }
}

/// Register the Route 53 provider under `aws` (and the alias `route53`)
pub fn register(registry: &ProviderRegistry) {
    registry.register_provider("aws", Box::new(Route53Factory));
    registry.register_provider("route53", Box::new(Route53Factory));
}
