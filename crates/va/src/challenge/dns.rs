//! The DNS challenge prover
//!
//! Looks for a TXT record at `_acme-challenge.<name>` equal to the
//! challenge token. The record content is the raw token; signed-payload
//! variants are not accepted.

use crate::authority::ValidationAuthority;
use crate::challenge::{fail, succeed};
use crate::problem::ProblemDetails;
use crate::types::{Challenge, Identifier};

/// Label prefix the challenge TXT record is published under.
pub const DNS_CHALLENGE_LABEL: &str = "_acme-challenge";

impl ValidationAuthority {
    /// Validate a DNS challenge against its identifier
    pub async fn validate_dns(&self, identifier: &Identifier, challenge: Challenge) -> Challenge {
        if !identifier.is_dns() {
            return fail(
                challenge,
                ProblemDetails::malformed("identifier type for DNS challenge was not DNS"),
            );
        }
        if !challenge.token_is_sane() {
            return fail(
                challenge,
                ProblemDetails::malformed("challenge token is not sane"),
            );
        }
        // The tls field belongs to HTTP challenges; its presence here
        // means the challenge was assembled wrong.
        if challenge.tls.is_some() {
            return fail(
                challenge,
                ProblemDetails::malformed("DNS challenge must not carry a tls field"),
            );
        }

        self.log.audit(format!(
            "Attempting to validate DNS for {}",
            identifier.value
        ));

        let record_name = format!("{DNS_CHALLENGE_LABEL}.{}", identifier.value);

        let found = match self.resolver.lookup_txt(&record_name).await {
            Ok(found) => found,
            Err(e) => return fail(challenge, ProblemDetails::connection(e.to_string())),
        };

        if found.iter().any(|content| *content == challenge.token) {
            succeed(challenge)
        } else {
            fail(
                challenge,
                ProblemDetails::unauthorized(format!(
                    "no TXT record at {record_name} matched the challenge token"
                )),
            )
        }
    }
}
