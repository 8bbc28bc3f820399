//! Configuration types for the Perimeter validation authority
//!
//! The validation authority is wired up from a [`VaConfig`]: which ports
//! challenge connections go to, how long DNS queries may take, how many
//! redirects the HTTP fetcher follows, and which issuer domain CAA policy
//! is evaluated against. Loading (files, CLI, environment) is the
//! embedding service's business; this crate only defines the types, their
//! defaults, and semantic validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Semantic configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The redirect cap must allow at least the initial request.
    #[error("max_redirects must be at least 1 (got {0})")]
    RedirectCapTooSmall(usize),

    /// A zero DNS timeout would fail every query.
    #[error("dns_timeout_secs must be at least 1")]
    ZeroDnsTimeout,
}

// ============================================================================
// Ports
// ============================================================================

/// Ports challenge connections are made to
///
/// A port of zero means "not configured": any challenge that would need it
/// is rejected as malformed before network I/O. Production deployments use
/// the well-known defaults; tests point these at ephemeral listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Port for plaintext HTTP challenge fetches
    #[serde(default = "default_simple_http_port")]
    pub simple_http_port: u16,

    /// Port for TLS HTTP challenge fetches
    #[serde(default = "default_simple_https_port")]
    pub simple_https_port: u16,

    /// Port for SNI challenge handshakes
    #[serde(default = "default_dvsni_port")]
    pub dvsni_port: u16,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            simple_http_port: default_simple_http_port(),
            simple_https_port: default_simple_https_port(),
            dvsni_port: default_dvsni_port(),
        }
    }
}

impl PortConfig {
    /// All ports unconfigured; every challenge fails as malformed
    pub fn none() -> Self {
        Self {
            simple_http_port: 0,
            simple_https_port: 0,
            dvsni_port: 0,
        }
    }
}

// ============================================================================
// Validation authority configuration
// ============================================================================

/// Top-level configuration for the validation authority
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaConfig {
    /// Challenge connection ports
    #[serde(default)]
    pub ports: PortConfig,

    /// Deadline for a single DNS query
    #[serde(default = "default_dns_timeout_secs")]
    pub dns_timeout_secs: u64,

    /// Maximum number of HTTP redirects followed per challenge
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// The CA's own identity, compared against CAA issue/issuewild values
    ///
    /// Empty means CAA policy can never authorize this CA; deployments
    /// performing CAA checks must set it.
    #[serde(default)]
    pub issuer_domain: String,
}

impl Default for VaConfig {
    fn default() -> Self {
        Self {
            ports: PortConfig::default(),
            dns_timeout_secs: default_dns_timeout_secs(),
            max_redirects: default_max_redirects(),
            issuer_domain: String::new(),
        }
    }
}

impl VaConfig {
    /// The DNS query deadline as a [`Duration`]
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    /// Check semantic constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_redirects < 1 {
            return Err(ConfigError::RedirectCapTooSmall(self.max_redirects));
        }
        if self.dns_timeout_secs == 0 {
            return Err(ConfigError::ZeroDnsTimeout);
        }
        Ok(())
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_simple_http_port() -> u16 {
    80
}

fn default_simple_https_port() -> u16 {
    443
}

fn default_dvsni_port() -> u16 {
    443
}

fn default_dns_timeout_secs() -> u64 {
    5
}

fn default_max_redirects() -> usize {
    10
}
