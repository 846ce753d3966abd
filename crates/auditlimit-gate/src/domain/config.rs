//! Gate configuration with validation.
//!
//! Values come from built-in defaults, an optional TOML file and finally
//! environment overrides (see [`GateConfig::load`]).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Main gate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Model tiers and their rate limits
    pub tiers: TiersConfig,
    /// Forbidden-term list
    pub content: ContentConfig,
    /// External moderation service
    pub moderation: ModerationConfig,
    /// External entitlement service and cache
    pub entitlement: EntitlementConfig,
    /// Visitor registry housekeeping
    pub registry: RegistryConfig,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
}

impl GateConfig {
    /// Load configuration: defaults, then the TOML file (if any), then the
    /// process environment. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file. Missing sections keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment overrides through `lookup`.
    ///
    /// Numeric overrides are only applied when they parse to a positive value,
    /// anything else is ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = positive::<u16>(&lookup, "PORT") {
            self.server.port = port;
        }
        if let Some(limit) = positive::<u32>(&lookup, "LIMIT") {
            self.tiers.standard.limit = limit;
        }
        if let Some(period) = period(&lookup, "PER") {
            self.tiers.standard.period = period;
        }
        if let Some(limit) = positive::<u32>(&lookup, "HEAVY_LIMIT") {
            self.tiers.heavy.limit = limit;
        }
        if let Some(period) = period(&lookup, "HEAVY_PER") {
            self.tiers.heavy.period = period;
        }
        if let Some(models) = list(&lookup, "PLUS_MODELS") {
            self.tiers.standard.models = models;
        }
        if let Some(models) = list(&lookup, "HEAVY_MODELS") {
            self.tiers.heavy.models = models;
        }
        if let Some(model) = lookup("FREE_MODEL").filter(|m| !m.trim().is_empty()) {
            self.tiers.free_model = model.trim().to_string();
        }
        if let Some(terms) = list(&lookup, "FORBIDDEN_WORDS") {
            self.content.forbidden_terms = terms;
        }
        if let Some(key) = lookup("OAIKEY").filter(|k| !k.is_empty()) {
            self.moderation.api_key = Some(key);
        }
        if let Some(endpoint) = lookup("MODERATION").filter(|e| !e.is_empty()) {
            self.moderation.endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("ENTITLEMENT_URL").filter(|e| !e.is_empty()) {
            self.entitlement.endpoint = Some(endpoint);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tiers.standard.validate("standard")?;
        self.tiers.heavy.validate("heavy")?;

        if self.tiers.free_model.trim().is_empty() {
            return Err(ConfigError::InvalidTier("free_model cannot be empty".into()));
        }

        if self.tiers.heavy_key_suffix.is_empty() {
            return Err(ConfigError::InvalidTier(
                "heavy_key_suffix cannot be empty".into(),
            ));
        }

        let standard: HashSet<&str> = self.tiers.standard.models.iter().map(String::as_str).collect();
        if let Some(shared) = self
            .tiers
            .heavy
            .models
            .iter()
            .find(|m| standard.contains(m.as_str()))
        {
            return Err(ConfigError::InvalidTier(format!(
                "model '{}' is listed in both the standard and heavy tiers",
                shared
            )));
        }

        let free = self.tiers.free_model.as_str();
        if standard.contains(free) || self.tiers.heavy.models.iter().any(|m| m == free) {
            return Err(ConfigError::InvalidTier(format!(
                "free model '{}' cannot be rate limited",
                free
            )));
        }

        if self.content.forbidden_terms.iter().any(|t| t.is_empty()) {
            return Err(ConfigError::Invalid("forbidden terms cannot be empty".into()));
        }

        if self.moderation.api_key.is_some() && self.moderation.endpoint.is_empty() {
            return Err(ConfigError::Invalid(
                "moderation endpoint required when an api key is set".into(),
            ));
        }

        if self.entitlement.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidTimeout("entitlement cache_ttl cannot be 0".into()));
        }

        if self.timeouts.request.is_zero() || self.timeouts.dependency.is_zero() {
            return Err(ConfigError::InvalidTimeout("timeouts cannot be 0".into()));
        }

        if self.registry.cleanup_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "registry cleanup_interval cannot be 0".into(),
            ));
        }

        if self.server.max_request_size == 0 {
            return Err(ConfigError::Invalid("max_request_size cannot be 0".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Log the effective settings at startup.
    pub fn log_summary(&self) {
        info!(
            addr = %self.http_addr(),
            standard_limit = self.tiers.standard.limit,
            standard_period = %duration_str::format_duration(self.tiers.standard.period),
            heavy_limit = self.tiers.heavy.limit,
            heavy_period = %duration_str::format_duration(self.tiers.heavy.period),
            free_model = %self.tiers.free_model,
            forbidden_terms = self.content.forbidden_terms.len(),
            moderation = self.moderation.is_enabled(),
            entitlement = self.entitlement.endpoint.is_some(),
            "Gate configuration loaded"
        );
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + Default + PartialOrd,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid numeric override");
            None
        }
    }
}

fn period(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Duration> {
    let raw = lookup(key)?;
    match duration_str::parse_duration(&raw) {
        Ok(d) if !d.is_zero() => Some(d),
        _ => {
            warn!(key, value = %raw, "Ignoring invalid duration override");
            None
        }
    }
}

fn list(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<Vec<String>> {
    let raw = lookup(key)?;
    Some(
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    )
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
    /// Max request body size in bytes
    pub max_request_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            max_request_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Rate limit for one tier: `limit` requests regenerate over `period`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    /// Bucket capacity
    pub limit: u32,
    /// Full refill period
    #[serde(with = "duration_str")]
    pub period: Duration,
    /// Models billed to this tier
    #[serde(default)]
    pub models: Vec<String>,
}

impl TierConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::InvalidRateLimit(format!(
                "{} limit cannot be 0",
                name
            )));
        }
        if self.period.is_zero() {
            return Err(ConfigError::InvalidRateLimit(format!(
                "{} period cannot be 0",
                name
            )));
        }
        Ok(())
    }

    /// Whether `model` belongs to this tier
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Model tiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TiersConfig {
    /// The only model non-premium callers may use (never rate limited)
    pub free_model: String,
    /// Standard premium tier
    pub standard: TierConfig,
    /// Heavy premium tier (separate, smaller budget)
    pub heavy: TierConfig,
    /// Discriminator appended to the identity for heavy-tier buckets
    pub heavy_key_suffix: String,
}

impl Default for TiersConfig {
    fn default() -> Self {
        Self {
            free_model: "gpt-4o-mini".to_string(),
            standard: TierConfig {
                limit: 40,
                period: Duration::from_secs(3 * 3600),
                models: [
                    "gpt-4",
                    "gpt-4-browsing",
                    "gpt-4-plugins",
                    "gpt-4-mobile",
                    "gpt-4-code-interpreter",
                    "gpt-4-dalle",
                    "gpt-4-gizmo",
                    "gpt-4-magic-create",
                    "gpt-4o",
                ]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            },
            heavy: TierConfig {
                limit: 10,
                period: Duration::from_secs(3 * 3600),
                models: vec!["o1-preview".to_string(), "o1-mini".to_string()],
            },
            heavy_key_suffix: "heavy".to_string(),
        }
    }
}

/// Content filter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Case-sensitive substrings that block a request
    pub forbidden_terms: Vec<String>,
}

/// Moderation service configuration. Disabled unless `api_key` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Bearer key for the moderation service
    pub api_key: Option<String>,
    /// Moderation endpoint URL
    pub endpoint: String,
}

impl ModerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.openai.com/v1/moderations".to_string(),
        }
    }
}

/// Entitlement service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementConfig {
    /// Entitlement endpoint (None = every caller is non-premium)
    pub endpoint: Option<String>,
    /// How long a resolved entitlement is trusted
    #[serde(with = "duration_str")]
    pub cache_ttl: Duration,
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            cache_ttl: Duration::from_secs(4 * 3600),
        }
    }
}

/// Visitor registry housekeeping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// How often fully refilled buckets are evicted
    #[serde(with = "duration_str")]
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upper bound for a whole admission request
    #[serde(with = "duration_str")]
    pub request: Duration,
    /// Upper bound for each outbound moderation/entitlement call
    #[serde(with = "duration_str")]
    pub dependency: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(15),
            dependency: Duration::from_secs(5),
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {error}")]
    Io { path: String, error: String },
    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid tier/model layout
    #[error("invalid tier: {0}")]
    InvalidTier(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Human-readable Duration serialization.
///
/// Accepts compound values such as `"1h30m"`, `"3h0m0s"` or `"2h 15min"`, and
/// a bare number of seconds. Serializes with the largest exact unit.
pub mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    /// Format using the largest unit that represents the value exactly.
    pub fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_nanos() != 0 {
            format!("{}ms", d.as_millis())
        } else if secs != 0 && secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs != 0 && secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }

    pub fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
        let s = s.trim();
        // Unitless values are seconds
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(secs) = s.parse::<u64>() {
                return Ok(Duration::from_secs(secs));
            }
        }
        humantime::parse_duration(s)
    }
}
