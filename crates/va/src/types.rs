//! Core data model: identifiers, challenges, authorizations
//!
//! These are the wire-facing types the registration authority hands to
//! the VA and receives back. Field names follow the ACME JSON encoding.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::jws::{Jwk, Jws};
use crate::problem::ProblemDetails;

/// Expected token shape: 256 bits of URL-safe base64.
pub const TOKEN_LENGTH: usize = 43;

// ============================================================================
// Identifiers
// ============================================================================

/// The kind of thing an authorization names
///
/// Only DNS identifiers are validatable; anything else is preserved
/// verbatim so it can be rejected as malformed rather than lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IdentifierType {
    Dns,
    Other(String),
}

impl From<String> for IdentifierType {
    fn from(value: String) -> Self {
        if value == "dns" {
            IdentifierType::Dns
        } else {
            IdentifierType::Other(value)
        }
    }
}

impl From<IdentifierType> for String {
    fn from(value: IdentifierType) -> Self {
        match value {
            IdentifierType::Dns => "dns".to_string(),
            IdentifierType::Other(other) => other,
        }
    }
}

/// A name an account holder claims control of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub kind: IdentifierType,
    pub value: String,
}

impl Identifier {
    /// A DNS identifier for the given hostname
    pub fn dns(value: impl Into<String>) -> Self {
        Self {
            kind: IdentifierType::Dns,
            value: value.into(),
        }
    }

    pub fn is_dns(&self) -> bool {
        self.kind == IdentifierType::Dns
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

// ============================================================================
// Challenges
// ============================================================================

/// Challenge protocol selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeType {
    #[serde(rename = "simpleHttp")]
    SimpleHttp,
    #[serde(rename = "dvsni")]
    Dvsni,
    #[serde(rename = "dns")]
    Dns,
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChallengeType::SimpleHttp => "simpleHttp",
            ChallengeType::Dvsni => "dvsni",
            ChallengeType::Dns => "dns",
        };
        f.write_str(name)
    }
}

/// Challenge lifecycle state
///
/// `Pending` transitions to exactly one of `Valid` or `Invalid`; both are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeStatus {
    Pending,
    Valid,
    Invalid,
}

impl ChallengeStatus {
    pub fn is_final(self) -> bool {
        matches!(self, ChallengeStatus::Valid | ChallengeStatus::Invalid)
    }
}

/// One hop taken by the HTTP fetcher while validating a challenge
///
/// The record is created by the fetcher, owned by the challenge it
/// belongs to, and never revisited after the challenge terminates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRecord {
    pub url: String,
    pub hostname: String,
    pub port: u16,
    pub addresses_resolved: Vec<Ipv4Addr>,
    pub address_used: Ipv4Addr,
}

/// A single proof-of-control attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,

    pub status: ChallengeStatus,

    /// 43 characters of URL-safe base64 issued with the challenge.
    pub token: String,

    /// Whether the HTTP challenge runs over TLS. Absent means yes; must be
    /// absent on DNS challenges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<bool>,

    /// Detached signature by the account key over the challenge type and
    /// token, in compact serialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Jws>,

    /// The account's public key, used to verify challenge responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_key: Option<Jwk>,

    /// Classification of the failure when `status` is invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProblemDetails>,

    /// Hops taken while validating, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_record: Vec<ValidationRecord>,
}

impl Challenge {
    /// A pending challenge of the given type and token
    pub fn new(challenge_type: ChallengeType, token: impl Into<String>) -> Self {
        Self {
            challenge_type,
            status: ChallengeStatus::Pending,
            token: token.into(),
            tls: None,
            validation: None,
            account_key: None,
            error: None,
            validation_record: Vec::new(),
        }
    }

    pub fn simple_http(token: impl Into<String>) -> Self {
        Self::new(ChallengeType::SimpleHttp, token)
    }

    pub fn dvsni(token: impl Into<String>) -> Self {
        Self::new(ChallengeType::Dvsni, token)
    }

    pub fn dns(token: impl Into<String>) -> Self {
        Self::new(ChallengeType::Dns, token)
    }

    /// Whether the token has the issued shape
    pub fn token_is_sane(&self) -> bool {
        token_is_well_formed(&self.token)
    }
}

/// Check a token against the issued shape (43 URL-safe base64 characters)
pub fn token_is_well_formed(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

// ============================================================================
// Authorizations
// ============================================================================

/// A pending authorization: one identifier, several candidate challenges
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub id: String,
    pub registration_id: i64,
    pub identifier: Identifier,
    pub challenges: Vec<Challenge>,
}
