//! Resolution server pool
//!
//! Tracks per-server failure counters and the failed-server registry. A
//! server that fails `max_failures` times is marked with the time of that
//! failure and skipped until the cool-down has elapsed.
//!
//! Counters are never reset by a success; once a server has reached the
//! threshold, each further failure re-marks it with a fresh timestamp.

use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Default public echo services and their weights
pub const DEFAULT_SERVERS: &[(&str, u32)] = &[
    ("https://api.ipify.org", 10),
    ("https://icanhazip.com", 9),
    ("https://ifconfig.me/ip", 8),
    ("https://ipecho.net/plain", 7),
    ("https://myexternalip.com/raw", 6),
];

/// A public echo service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpServer {
    pub url: String,
    /// Informational only; selection is uniform
    pub weight: u32,
    /// Failures observed so far
    pub failures: u32,
}

impl IpServer {
    pub fn new(url: impl Into<String>, weight: u32) -> Self {
        Self {
            url: url.into(),
            weight,
            failures: 0,
        }
    }
}

/// The built-in server list
pub fn default_servers() -> Vec<IpServer> {
    DEFAULT_SERVERS
        .iter()
        .map(|(url, weight)| IpServer::new(*url, *weight))
        .collect()
}

/// Server descriptors plus the failed-server registry
#[derive(Debug)]
pub struct ServerPool {
    servers: Vec<IpServer>,
    /// url -> time the server was last marked failed
    failed: HashMap<String, Instant>,
    max_failures: u32,
    cooldown: Duration,
}

impl ServerPool {
    pub fn new(servers: Vec<IpServer>, max_failures: u32, cooldown: Duration) -> Self {
        Self {
            servers,
            failed: HashMap::new(),
            max_failures,
            cooldown,
        }
    }

    /// Whether `url` may be selected at `now`
    pub fn is_available(&self, url: &str, now: Instant) -> bool {
        match self.failed.get(url) {
            None => true,
            Some(marked) => now.saturating_duration_since(*marked) > self.cooldown,
        }
    }

    /// URLs eligible for selection at `now`, in list order
    pub fn available(&self, now: Instant) -> Vec<&str> {
        self.servers
            .iter()
            .filter(|server| self.is_available(&server.url, now))
            .map(|server| server.url.as_str())
            .collect()
    }

    /// Pick up to `count` eligible servers uniformly at random, without replacement
    pub fn select(&self, now: Instant, count: usize) -> Vec<String> {
        let available = self.available(now);
        let mut rng = rand::thread_rng();
        available
            .choose_multiple(&mut rng, count)
            .map(|url| url.to_string())
            .collect()
    }

    /// Count one failure against `url`
    ///
    /// Returns the updated counter, or `None` for a URL not in the pool.
    pub fn record_failure(&mut self, url: &str, now: Instant) -> Option<u32> {
        let server = self.servers.iter_mut().find(|s| s.url == url)?;
        server.failures += 1;

        if server.failures >= self.max_failures {
            self.failed.insert(url.to_string(), now);
        }

        Some(server.failures)
    }

    pub fn failures(&self, url: &str) -> Option<u32> {
        self.servers.iter().find(|s| s.url == url).map(|s| s.failures)
    }

    /// When `url` was last marked failed
    pub fn marked_at(&self, url: &str) -> Option<Instant> {
        self.failed.get(url).copied()
    }

    pub fn servers(&self) -> &[IpServer] {
        &self.servers
    }
}
