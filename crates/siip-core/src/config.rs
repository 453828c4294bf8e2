//! Configuration types for SI-IP
//!
//! Configuration is assembled from three layers, lowest precedence first:
//!
//! 1. Built-in defaults (`provider = "aws"`, `refresh_interval = 300`)
//! 2. An optional TOML file named by `CONFIG_FILE` (must exist when set)
//! 3. Environment variables
//!
//! ## File layout
//!
//! ```toml
//! [global]
//! provider = "aws"
//! refresh_interval = 300
//! record_name = "host.example.com"
//!
//! [aws]
//! aws_access_key_id = "AKIA..."
//! aws_secret_access_key = "..."
//! hosted_zone_id = "Z0123456789"
//!
//! [cloudflare]
//! api_token = "..."
//! zone_id = "..."
//!
//! [log]
//! level = "info"
//! format = "json"
//! ```
//!
//! ## Environment
//!
//! `DNS_PROVIDER`, `REFRESH_INTERVAL`, `RECORD_NAME`, `AWS_ACCESS_KEY_ID`,
//! `AWS_SECRET_ACCESS_KEY`, `HOSTED_ZONE_ID`, `CF_API_TOKEN`, `CF_ZONE_ID`,
//! `SIIP_LOG_LEVEL`, `SIIP_LOG_FORMAT`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the optional configuration file
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

const DEFAULT_PROVIDER: &str = "aws";
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Main SI-IP configuration
///
/// Immutable once loaded. Shared by reference between the daemon, the
/// provider factories and the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// DNS provider selector (e.g. "aws", "cloudflare")
    pub provider: String,

    /// Poll interval in seconds, also used as the record TTL
    pub refresh_interval_secs: u64,

    /// Fully qualified record name to keep in sync
    pub record_name: String,

    /// AWS Route 53 settings
    pub aws: AwsConfig,

    /// Cloudflare settings
    pub cloudflare: CloudflareConfig,

    /// Logging settings
    pub log: LogConfig,
}

/// AWS Route 53 settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AwsConfig {
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub hosted_zone_id: String,
}

/// Cloudflare settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CloudflareConfig {
    pub api_token: String,
    pub zone_id: String,
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. "info" or "siip_core=debug"
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(Error::config(format!(
                "Unknown log format '{}'. Valid formats: text, json",
                other
            ))),
        }
    }
}

/// On-disk layout of the TOML configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    global: GlobalSection,
    aws: AwsSection,
    cloudflare: CloudflareConfig,
    log: Option<LogConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GlobalSection {
    provider: Option<String>,
    refresh_interval: Option<u64>,
    record_name: Option<String>,
}

/// `[aws]` also accepts `record_name`, used when `[global]` has none
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AwsSection {
    #[serde(flatten)]
    credentials: AwsConfig,
    record_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            record_name: String::new(),
            aws: AwsConfig::default(),
            cloudflare: CloudflareConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// Reads the file named by `CONFIG_FILE` when set, then applies
    /// environment overrides. Does not validate; call [`Config::validate`].
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration using an arbitrary variable lookup
    ///
    /// The lookup stands in for the process environment so callers (and
    /// tests) can supply their own variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(CONFIG_FILE_ENV).filter(|p| !p.is_empty()) {
            let path = Path::new(&path);
            if !path.exists() {
                return Err(Error::config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            config.merge_file(path)?;
        }

        config.merge_env(lookup)?;
        Ok(config)
    }

    /// Overlay values from a TOML file
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&text).map_err(|e| {
            Error::config(format!("Invalid configuration file {}: {}", path.display(), e))
        })?;

        if let Some(provider) = file.global.provider {
            self.provider = provider;
        }
        if let Some(interval) = file.global.refresh_interval {
            self.refresh_interval_secs = interval;
        }
        if let Some(record_name) = file.global.record_name.or(file.aws.record_name) {
            self.record_name = record_name;
        }
        self.aws = file.aws.credentials;
        self.cloudflare = file.cloudflare;
        if let Some(log) = file.log {
            self.log = log;
        }

        Ok(())
    }

    fn merge_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut String, key: &str| {
            if let Some(value) = lookup(key) {
                *target = value;
            }
        };

        set(&mut self.provider, "DNS_PROVIDER");
        set(&mut self.record_name, "RECORD_NAME");
        set(&mut self.aws.aws_access_key_id, "AWS_ACCESS_KEY_ID");
        set(&mut self.aws.aws_secret_access_key, "AWS_SECRET_ACCESS_KEY");
        set(&mut self.aws.hosted_zone_id, "HOSTED_ZONE_ID");
        set(&mut self.cloudflare.api_token, "CF_API_TOKEN");
        set(&mut self.cloudflare.zone_id, "CF_ZONE_ID");
        set(&mut self.log.level, "SIIP_LOG_LEVEL");

        if let Some(raw) = lookup("REFRESH_INTERVAL") {
            self.refresh_interval_secs = raw.trim().parse().map_err(|_| {
                Error::config(format!(
                    "REFRESH_INTERVAL must be a whole number of seconds. Got: {}",
                    raw
                ))
            })?;
        }

        if let Some(raw) = lookup("SIIP_LOG_FORMAT") {
            self.log.format = raw.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Every missing or empty required field is collected and reported in
    /// a single [`Error::MissingConfig`].
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.provider.trim().is_empty() {
            missing.push("provider");
        }
        if self.refresh_interval_secs == 0 {
            missing.push("refresh_interval");
        }

        match self.provider_key().as_str() {
            "aws" | "route53" => {
                if self.aws.aws_access_key_id.is_empty() {
                    missing.push("aws_access_key_id");
                }
                if self.aws.aws_secret_access_key.is_empty() {
                    missing.push("aws_secret_access_key");
                }
                if self.aws.hosted_zone_id.is_empty() {
                    missing.push("hosted_zone_id");
                }
            }
            "cloudflare" => {
                if self.cloudflare.api_token.is_empty() {
                    missing.push("cf_api_token");
                }
                if self.cloudflare.zone_id.is_empty() {
                    missing.push("cf_zone_id");
                }
            }
            // Unknown providers are rejected by the registry
            _ => {}
        }

        if self.record_name.trim().is_empty() {
            missing.push("record_name");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingConfig(
                missing.into_iter().map(String::from).collect(),
            ))
        }
    }

    /// Normalised provider selector used for registry lookups
    pub fn provider_key(&self) -> String {
        self.provider.trim().to_lowercase()
    }

    /// Interval between poll iterations
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// TTL advertised on created and updated records
    pub fn record_ttl(&self) -> u32 {
        u32::try_from(self.refresh_interval_secs).unwrap_or(u32::MAX)
    }

    /// Loggable view of the configuration with credentials masked
    pub fn redacted(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        mask_secrets(&mut value);
        value
    }
}

fn mask_secrets(value: &mut serde_json::Value) {
    if let serde_json::Value::Object(map) = value {
        for (key, field) in map.iter_mut() {
            let sensitive = key.contains("key") || key.contains("token") || key.contains("secret");
            match field {
                serde_json::Value::String(s) if sensitive && !s.is_empty() => {
                    *s = "***".to_string();
                }
                serde_json::Value::Object(_) => mask_secrets(field),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete_aws() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DNS_PROVIDER", "aws"),
            ("REFRESH_INTERVAL", "120"),
            ("RECORD_NAME", "host.example.com"),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "wJalrXUtnFEMI"),
            ("HOSTED_ZONE_ID", "Z123"),
        ]
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, "aws");
        assert_eq!(config.refresh_interval_secs, 300);
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn env_populates_aws_config() {
        let config = Config::from_lookup(lookup(&complete_aws())).unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(120));
        assert_eq!(config.record_ttl(), 120);
        assert_eq!(config.aws.hosted_zone_id, "Z123");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let vars: Vec<_> = complete_aws()
            .into_iter()
            .filter(|(k, _)| *k != "HOSTED_ZONE_ID" && *k != "RECORD_NAME")
            .collect();
        let config = Config::from_lookup(lookup(&vars)).unwrap();

        let err = config.validate().unwrap_err();
        match &err {
            Error::MissingConfig(fields) => {
                assert_eq!(fields, &vec!["hosted_zone_id".to_string(), "record_name".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("hosted_zone_id"));
        assert!(message.contains("record_name"));
    }

    #[test]
    fn empty_values_count_as_missing() {
        let mut vars = complete_aws();
        vars.retain(|(k, _)| *k != "AWS_SECRET_ACCESS_KEY");
        vars.push(("AWS_SECRET_ACCESS_KEY", ""));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required configuration: aws_secret_access_key");
    }

    #[test]
    fn cloudflare_requires_its_own_fields() {
        let config = Config::from_lookup(lookup(&[
            ("DNS_PROVIDER", "cloudflare"),
            ("RECORD_NAME", "host.example.com"),
        ]))
        .unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required configuration: cf_api_token, cf_zone_id"
        );
    }

    #[test]
    fn zero_interval_is_missing() {
        let mut vars = complete_aws();
        vars.retain(|(k, _)| *k != "REFRESH_INTERVAL");
        vars.push(("REFRESH_INTERVAL", "0"));
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert!(config.validate().unwrap_err().to_string().contains("refresh_interval"));
    }

    #[test]
    fn bad_interval_is_rejected_at_load() {
        let err = Config::from_lookup(lookup(&[("REFRESH_INTERVAL", "soon")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn file_is_overridden_by_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[global]
provider = "aws"
refresh_interval = 60
record_name = "file.example.com"

[aws]
aws_access_key_id = "FILEKEY"
aws_secret_access_key = "FILESECRET"
hosted_zone_id = "ZFILE"

[log]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = Config::from_lookup(lookup(&[
            ("CONFIG_FILE", path.as_str()),
            ("RECORD_NAME", "env.example.com"),
        ]))
        .unwrap();

        assert_eq!(config.refresh_interval_secs, 60);
        assert_eq!(config.record_name, "env.example.com");
        assert_eq!(config.aws.aws_access_key_id, "FILEKEY");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn aws_section_record_name_is_a_fallback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[aws]
aws_access_key_id = "FILEKEY"
aws_secret_access_key = "FILESECRET"
hosted_zone_id = "ZFILE"
record_name = "aws.example.com"
"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = Config::from_lookup(lookup(&[("CONFIG_FILE", path.as_str())])).unwrap();

        assert_eq!(config.record_name, "aws.example.com");
        assert_eq!(config.aws.hosted_zone_id, "ZFILE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn global_record_name_wins_over_aws_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[global]
record_name = "global.example.com"

[aws]
record_name = "aws.example.com"
"#
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let config = Config::from_lookup(lookup(&[("CONFIG_FILE", path.as_str())])).unwrap();

        assert_eq!(config.record_name, "global.example.com");
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let path = path.to_string_lossy().to_string();

        let err = Config::from_lookup(lookup(&[("CONFIG_FILE", path.as_str())])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn redacted_masks_credentials() {
        let config = Config::from_lookup(lookup(&complete_aws())).unwrap();
        let view = config.redacted().to_string();
        assert!(!view.contains("wJalrXUtnFEMI"));
        assert!(!view.contains("AKIDEXAMPLE"));
        assert!(view.contains("host.example.com"));
        assert!(view.contains("Z123"));
    }
}
