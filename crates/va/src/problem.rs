//! Public error taxonomy for failed validations
//!
//! Internal layers (DNS, fetcher, TLS, JWS) carry their own typed errors;
//! the provers translate them into a [`ProblemDetails`] at the boundary so
//! transport-level strings never leak to ACME clients.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, client-visible failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProblemType {
    /// TCP refused, DNS servfail/timeout, read timeout, redirect loop.
    #[serde(rename = "urn:acme:error:connection")]
    Connection,

    /// DNS returned no usable addresses for the name.
    #[serde(rename = "urn:acme:error:unknownHost")]
    UnknownHost,

    /// The remote answered, but not with proof of control.
    #[serde(rename = "urn:acme:error:unauthorized")]
    Unauthorized,

    /// The request itself was unusable: bad identifier, bad token,
    /// inconsistent challenge fields, unconfigured port.
    #[serde(rename = "urn:acme:error:malformed")]
    Malformed,

    /// TLS handshake failure, distinct from TCP-level connection errors.
    #[serde(rename = "urn:acme:error:tls")]
    Tls,

    /// CAA policy forbids issuance.
    #[serde(rename = "urn:acme:error:caa")]
    Caa,
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProblemType::Connection => "connection",
            ProblemType::UnknownHost => "unknownHost",
            ProblemType::Unauthorized => "unauthorized",
            ProblemType::Malformed => "malformed",
            ProblemType::Tls => "tls",
            ProblemType::Caa => "caa",
        };
        f.write_str(name)
    }
}

/// A classified failure attached to an invalid challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: ProblemType,
    pub detail: String,
}

impl ProblemDetails {
    pub fn new(problem_type: ProblemType, detail: impl Into<String>) -> Self {
        Self {
            problem_type,
            detail: detail.into(),
        }
    }

    pub fn connection(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::Connection, detail)
    }

    pub fn unknown_host(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::UnknownHost, detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::Unauthorized, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::Malformed, detail)
    }

    pub fn tls(detail: impl Into<String>) -> Self {
        Self::new(ProblemType::Tls, detail)
    }
}

impl fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.problem_type, self.detail)
    }
}

impl std::error::Error for ProblemDetails {}
