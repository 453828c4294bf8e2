//! Test doubles and common utilities for controller contract tests
//!
//! The doubles are cheap to clone; clones share state, so a test keeps one
//! handle for assertions and hands another to the controller.

#![allow(dead_code)]

use siip_core::config::{AwsConfig, Config};
use siip_core::error::{Error, Result};
use siip_core::traits::{ChangeAction, DnsProvider, IpResolver, RecordChange, RecordMetadata};
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const RECORD: &str = "host.example.com";

/// An IpResolver that replays scripted answers
///
/// Once the script is exhausted every call returns the fallback address,
/// or `ResolutionFailed` when there is none.
#[derive(Clone)]
pub struct MockIpResolver {
    script: Arc<Mutex<VecDeque<Option<Ipv4Addr>>>>,
    fallback: Option<Ipv4Addr>,
    work: Duration,
    calls: Arc<Mutex<Vec<Instant>>>,
}

impl MockIpResolver {
    /// Always answers `ip`
    pub fn fixed(ip: Ipv4Addr) -> Self {
        Self::scripted(Vec::new(), Some(ip))
    }

    /// Always fails
    pub fn failing() -> Self {
        Self::scripted(Vec::new(), None)
    }

    /// Answers from `script` in order (`None` = failure), then `fallback`
    pub fn scripted(script: Vec<Option<Ipv4Addr>>, fallback: Option<Ipv4Addr>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback,
            work: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make each call take `work` of (virtual) time
    pub fn with_work(mut self, work: Duration) -> Self {
        self.work = work;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Start times of every call, oldest first
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IpResolver for MockIpResolver {
    async fn get_ip(&self) -> Result<Ipv4Addr> {
        self.calls.lock().unwrap().push(Instant::now());

        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }

        let answer = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        answer.ok_or(Error::ResolutionFailed)
    }
}

/// A DnsProvider backed by a single in-memory record
#[derive(Clone)]
pub struct MockDnsProvider {
    published: Arc<Mutex<Option<Ipv4Addr>>>,
    lookup_fails: Arc<AtomicBool>,
    change_fails: Arc<AtomicBool>,
    lookups: Arc<AtomicUsize>,
    creates: Arc<Mutex<Vec<(String, Ipv4Addr)>>>,
    updates: Arc<Mutex<Vec<(String, Ipv4Addr)>>>,
}

impl MockDnsProvider {
    /// Provider whose record currently points at `ip`
    pub fn with_record(ip: Ipv4Addr) -> Self {
        let provider = Self::without_record();
        *provider.published.lock().unwrap() = Some(ip);
        provider
    }

    /// Provider with no record yet
    pub fn without_record() -> Self {
        Self {
            published: Arc::new(Mutex::new(None)),
            lookup_fails: Arc::new(AtomicBool::new(false)),
            change_fails: Arc::new(AtomicBool::new(false)),
            lookups: Arc::new(AtomicUsize::new(0)),
            creates: Arc::new(Mutex::new(Vec::new())),
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.lookup_fails.store(fail, Ordering::SeqCst);
    }

    pub fn fail_changes(&self, fail: bool) {
        self.change_fails.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Option<Ipv4Addr> {
        *self.published.lock().unwrap()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// CREATE changes submitted, accepted or not
    pub fn creates(&self) -> Vec<(String, Ipv4Addr)> {
        self.creates.lock().unwrap().clone()
    }

    /// UPSERT changes submitted, accepted or not
    pub fn updates(&self) -> Vec<(String, Ipv4Addr)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn fetch_record(&self, name: &str) -> Result<Option<RecordMetadata>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.lookup_fails.load(Ordering::SeqCst) {
            return Err(Error::http("lookup refused"));
        }

        Ok(self.published().map(|ip| RecordMetadata {
            name: name.to_string(),
            ip: Some(ip),
            ttl: Some(300),
        }))
    }

    async fn apply_change(&self, change: &RecordChange) -> Result<String> {
        let log = match change.action {
            ChangeAction::Create => &self.creates,
            ChangeAction::Upsert => &self.updates,
        };
        log.lock().unwrap().push((change.name.clone(), change.ip));

        if self.change_fails.load(Ordering::SeqCst) {
            return Err(Error::provider("mock", "change rejected"));
        }

        *self.published.lock().unwrap() = Some(change.ip);
        Ok(format!("change-{}", change.ip))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Helper to create a minimal valid Config for testing
pub fn minimal_config(record_name: &str, refresh_interval_secs: u64) -> Config {
    Config {
        provider: "aws".to_string(),
        refresh_interval_secs,
        record_name: record_name.to_string(),
        aws: AwsConfig {
            aws_access_key_id: "AKIDEXAMPLE".to_string(),
            aws_secret_access_key: "secret".to_string(),
            hosted_zone_id: "Z0123456789".to_string(),
        },
        ..Config::default()
    }
}

pub fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}
