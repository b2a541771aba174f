//! Cache tuning shared by the service and the in-memory backend

use crate::error::{CacheError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HOUR: u64 = 3600;
const MB: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for operations that do not declare one
    pub default_ttl: Duration,

    /// Fraction (0.0 - 1.0) by which default TTLs are randomly stretched or shrunk
    pub ttl_jitter: f64,

    pub max_entries: usize,
    pub max_size_bytes: usize,

    /// Evict least recently used entries when a limit is reached; otherwise refuse the write
    pub enable_lru_eviction: bool,

    pub enable_auto_cleanup: bool,
    pub cleanup_interval: Duration,

    /// Bound on a single backend call; slower calls are treated as failures
    pub backend_timeout: Duration,

    /// Lifetime of tag associations stored in the backend
    pub tag_registry_ttl: Duration,

    /// Keep hit/miss/eviction counters in the in-memory backend
    pub enable_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(HOUR),
            ttl_jitter: 0.1,
            max_entries: 10_000,
            max_size_bytes: 100 * MB,
            enable_lru_eviction: true,
            enable_auto_cleanup: true,
            cleanup_interval: Duration::from_secs(300),
            backend_timeout: Duration::from_secs(2),
            tag_registry_ttl: Duration::from_secs(30 * 24 * HOUR),
            enable_metrics: true,
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder {
            config: CacheConfig::default(),
        }
    }

    /// Large, slow-moving entries such as retrieved documentation
    pub fn reference_docs() -> Self {
        Self {
            default_ttl: Duration::from_secs(48 * HOUR),
            max_entries: 100_000,
            max_size_bytes: 1024 * MB,
            ttl_jitter: 0.05,
            ..Default::default()
        }
    }

    /// Tight limits for tests and memory-constrained deployments
    pub fn small() -> Self {
        Self {
            default_ttl: Duration::from_secs(HOUR / 2),
            max_entries: 1_000,
            max_size_bytes: 10 * MB,
            ttl_jitter: 0.15,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.default_ttl.is_zero() {
            "default_ttl must be greater than 0"
        } else if self.max_entries == 0 {
            "max_entries must be greater than 0"
        } else if self.max_size_bytes == 0 {
            "max_size_bytes must be greater than 0"
        } else if !(0.0..=1.0).contains(&self.ttl_jitter) {
            "ttl_jitter must be between 0.0 and 1.0"
        } else if self.backend_timeout.is_zero() {
            "backend_timeout must be greater than 0"
        } else if self.enable_auto_cleanup && self.cleanup_interval.is_zero() {
            "cleanup_interval must be greater than 0"
        } else {
            return Ok(());
        };

        Err(CacheError::Config(problem.to_string()))
    }

    /// `default_ttl` moved randomly within ±`ttl_jitter`, never below one second
    /// unless the TTL itself is shorter
    pub fn ttl_with_jitter(&self) -> Duration {
        if self.ttl_jitter <= 0.0 {
            return self.default_ttl;
        }

        let base = self.default_ttl.as_secs_f64();
        let offset = rand::thread_rng().gen_range(-1.0..=1.0) * base * self.ttl_jitter;
        let floor = base.min(1.0);

        Duration::from_secs_f64((base + offset).max(floor))
    }
}

/// Starts from the defaults; every setter overrides one field
#[derive(Debug, Clone)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    pub fn ttl_jitter(mut self, jitter: f64) -> Self {
        self.config.ttl_jitter = jitter;
        self
    }

    pub fn max_entries(mut self, max: usize) -> Self {
        self.config.max_entries = max;
        self
    }

    pub fn max_size_bytes(mut self, size: usize) -> Self {
        self.config.max_size_bytes = size;
        self
    }

    pub fn enable_lru_eviction(mut self, enable: bool) -> Self {
        self.config.enable_lru_eviction = enable;
        self
    }

    pub fn enable_auto_cleanup(mut self, enable: bool) -> Self {
        self.config.enable_auto_cleanup = enable;
        self
    }

    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.config.backend_timeout = timeout;
        self
    }

    pub fn tag_registry_ttl(mut self, ttl: Duration) -> Self {
        self.config.tag_registry_ttl = ttl;
        self
    }

    pub fn enable_metrics(mut self, enable: bool) -> Self {
        self.config.enable_metrics = enable;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }

    /// Like [`build`](Self::build), rejecting invalid combinations
    pub fn try_build(self) -> Result<CacheConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
