//! Perimeter validation authority
//!
//! Given a pending authorization binding an account key to a DNS name,
//! the validation authority (VA) proves over the public Internet that the
//! account holder controls that name, then reports the outcome to the
//! registration authority. It also evaluates CAA policy against the
//! issuing CA's identity.
//!
//! # Architecture
//!
//! - [`ValidationAuthority`] - the orchestrator: picks a challenge out of
//!   an authorization, runs it on a detached task, writes the result back,
//!   and invokes the [`RegistrationAuthority`] callback exactly once
//! - [`challenge`] - the three challenge provers (HTTP, TLS-SNI, DNS TXT)
//! - [`http`] - the safe HTTP fetcher: resolves once per hop, pins the
//!   connect address, follows redirects itself, and records every hop
//! - [`dns`] - the resolver interface the VA consumes, plus a
//!   hickory-backed production implementation
//! - [`caa`] - the CAA tree climb and policy evaluation
//! - [`jws`] - compact JWS parsing and RS256 verification for challenge
//!   response payloads
//!
//! Hostile networks are the operating assumption: every hop carries a hard
//! deadline, hostnames are resolved exactly once per hop and the resulting
//! address is the one dialed (the Host header and SNI keep the name), and
//! redirect chains are bounded.

pub mod authority;
pub mod caa;
pub mod challenge;
pub mod dns;
pub mod http;
pub mod jws;
pub mod problem;
mod tls;
pub mod types;

pub use authority::{RegistrationAuthority, ValidationAuthority};
pub use caa::{CaaCheckResult, CaaError};
pub use dns::{CaaRecord, DnsError, DnsResolver, HickoryResolver};
pub use problem::{ProblemDetails, ProblemType};
pub use types::{
    Authorization, Challenge, ChallengeStatus, ChallengeType, Identifier, IdentifierType,
    ValidationRecord,
};
