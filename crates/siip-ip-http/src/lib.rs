// # HTTP IP Resolver
//
// Discovers the public IPv4 address by asking several plain-text echo
// services at once and taking the most common answer.
//
// ## Resolution round
//
// 1. Pick up to `sample_size` servers at random among those not cooling down
//    (waiting `exhausted_backoff` once if none are eligible)
// 2. Query them concurrently, each with `request_timeout`
// 3. Count a failure against every server that timed out, errored or
//    answered with anything but 200
// 4. Return the plurality of the addresses found in the 200 responses
//
// Servers that fail `max_failures` times cool down for `cooldown` before
// they are selected again.

pub mod consensus;
pub mod pool;

pub use pool::{DEFAULT_SERVERS, IpServer, ServerPool, default_servers};

use siip_core::traits::IpResolver;
use siip_core::{Error, Result};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// User-Agent sent to every echo service
pub const USER_AGENT: &str = "SI-IP Dynamic DNS updater";

/// Resolver tunables
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Servers queried per round
    pub sample_size: usize,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Failures before a server starts cooling down
    pub max_failures: u32,

    /// How long a failed server stays excluded
    pub cooldown: Duration,

    /// Wait before re-selecting when every server is cooling down
    pub exhausted_backoff: Duration,

    pub user_agent: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            sample_size: 3,
            request_timeout: Duration::from_secs(2),
            max_failures: 3,
            cooldown: Duration::from_secs(60 * 60),
            exhausted_backoff: Duration::from_secs(5 * 60),
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Outcome of querying one server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    /// 200 with a usable address
    Answer(Ipv4Addr),
    /// 200 without a usable address; not held against the server
    Unusable,
    /// Counts against the server
    Failed,
}

/// Multi-source HTTP public IP resolver
///
/// Each instance owns its server pool, so failure history is never shared
/// between resolvers.
pub struct HttpIpResolver {
    client: reqwest::Client,
    settings: ResolverSettings,
    pool: Mutex<ServerPool>,
}

impl HttpIpResolver {
    /// Resolver over the built-in server list with default settings
    pub fn new() -> Result<Self> {
        Self::with_servers(default_servers(), ResolverSettings::default())
    }

    /// Resolver over a custom server list
    pub fn with_servers(servers: Vec<IpServer>, settings: ResolverSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));

        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let pool = ServerPool::new(servers, settings.max_failures, settings.cooldown);

        Ok(Self {
            client,
            settings,
            pool: Mutex::new(pool),
        })
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Failures recorded against `url` so far
    pub fn server_failures(&self, url: &str) -> Option<u32> {
        self.pool().failures(url)
    }

    /// Servers currently eligible for selection
    pub fn available_servers(&self) -> Vec<String> {
        self.pool()
            .available(Instant::now())
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn pool(&self) -> MutexGuard<'_, ServerPool> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn select_servers(&self) -> Vec<String> {
        self.pool().select(Instant::now(), self.settings.sample_size)
    }

    async fn query(&self, url: &str) -> Probe {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() { "timeout" } else { "request error" };
                debug!(operation = "resolve", server = url, reason, error = %e, "IP server request failed");
                return Probe::Failed;
            }
        };

        let status = response.status();
        if matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::FORBIDDEN | StatusCode::SERVICE_UNAVAILABLE
        ) {
            warn!(operation = "resolve", server = url, status = status.as_u16(), "IP server is rate limiting");
            return Probe::Failed;
        }
        if status != StatusCode::OK {
            debug!(operation = "resolve", server = url, status = status.as_u16(), "Unexpected status from IP server");
            return Probe::Failed;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(operation = "resolve", server = url, error = %e, "Failed to read IP server response");
                return Probe::Failed;
            }
        };

        match consensus::extract_ipv4(&body) {
            Some(ip) => Probe::Answer(ip),
            None => {
                debug!(operation = "resolve", server = url, "No IPv4 address in response");
                Probe::Unusable
            }
        }
    }

    /// Apply a settled round to the failed-server registry
    fn record_round(&self, servers: &[String], probes: &[Probe]) {
        let now = Instant::now();
        let mut pool = self.pool();

        for (url, probe) in servers.iter().zip(probes) {
            if *probe != Probe::Failed {
                continue;
            }
            let Some(failures) = pool.record_failure(url, now) else {
                continue;
            };

            if failures >= self.settings.max_failures {
                warn!(
                    operation = "resolve",
                    server = %url,
                    failures,
                    cooldown_secs = self.settings.cooldown.as_secs(),
                    "IP server marked as failed"
                );
            } else {
                debug!(operation = "resolve", server = %url, failures, "IP server failure recorded");
            }
        }
    }
}

#[async_trait::async_trait]
impl IpResolver for HttpIpResolver {
    async fn get_ip(&self) -> Result<Ipv4Addr> {
        let mut servers = self.select_servers();

        if servers.is_empty() {
            warn!(
                operation = "resolve",
                backoff_secs = self.settings.exhausted_backoff.as_secs(),
                "All IP servers are cooling down, waiting before retrying"
            );
            tokio::time::sleep(self.settings.exhausted_backoff).await;

            servers = self.select_servers();
            if servers.is_empty() {
                return Err(Error::NoServersAvailable);
            }
        }

        debug!(operation = "resolve", servers = ?servers, "Querying IP servers");

        let probes = futures::future::join_all(servers.iter().map(|url| self.query(url))).await;
        self.record_round(&servers, &probes);

        let answers: Vec<Ipv4Addr> = probes
            .iter()
            .filter_map(|probe| match probe {
                Probe::Answer(ip) => Some(*ip),
                _ => None,
            })
            .collect();

        let ip = consensus::plurality(answers.iter().copied()).ok_or(Error::ResolutionFailed)?;

        info!(
            operation = "resolve",
            ip = %ip,
            answers = answers.len(),
            queried = servers.len(),
            "Public IP resolved"
        );
        Ok(ip)
    }
}
