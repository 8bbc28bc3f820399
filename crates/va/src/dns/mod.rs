//! DNS resolver interface
//!
//! The VA never talks to the network for DNS directly; it consumes this
//! trait. The semantics matter more than the transport:
//!
//! - NXDOMAIN and "no answer for this record type" are empty results, not
//!   errors — absence of a record is an ordinary outcome.
//! - SERVFAIL and timeouts are errors and must surface; callers classify
//!   them as connection problems or abort CAA checks on them.
//! - Implementations carry their own per-query deadline and must be
//!   re-entrant: validations run concurrently on detached tasks.

mod hickory;

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hickory::HickoryResolver;

/// Resolver failures that must surface to callers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("DNS query for {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("DNS failure for {name}: {message}")]
    ServFail { name: String, message: String },
}

impl DnsError {
    pub fn servfail(name: impl Into<String>, message: impl Into<String>) -> Self {
        DnsError::ServFail {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// One CAA property record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaaRecord {
    /// The issuer-critical flag (high bit of the flags octet).
    pub issuer_critical: bool,
    /// Property tag, lowercased: `issue`, `issuewild`, `iodef`, or unknown.
    pub tag: String,
    /// Property value as published.
    pub value: String,
}

impl CaaRecord {
    pub fn new(issuer_critical: bool, tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            issuer_critical,
            tag: tag.into(),
            value: value.into(),
        }
    }
}

/// Record lookups the VA depends on
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// IPv4 addresses for a hostname; empty when the name has none
    async fn lookup_host(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsError>;

    /// CNAME target for a name, if one exists
    async fn lookup_cname(&self, name: &str) -> Result<Option<String>, DnsError>;

    /// DNAME target for a name, if one exists
    async fn lookup_dname(&self, name: &str) -> Result<Option<String>, DnsError>;

    /// TXT strings published at a name; empty when there are none
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, DnsError>;

    /// CAA records published at a name; empty when there are none
    async fn lookup_caa(&self, name: &str) -> Result<Vec<CaaRecord>, DnsError>;
}
