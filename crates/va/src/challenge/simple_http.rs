//! The simpleHttp challenge prover
//!
//! Fetches `/.well-known/acme-challenge/<token>` from the identifier's
//! host (plaintext or TLS depending on the challenge's `tls` field) and
//! expects back a compact JWS, signed by the account key, whose payload
//! restates the challenge type, token, and TLS setting.

use std::sync::Arc;

use serde::Deserialize;

use crate::authority::ValidationAuthority;
use crate::challenge::{fail, succeed};
use crate::http::HttpFetcher;
use crate::problem::ProblemDetails;
use crate::types::{Challenge, Identifier};

/// Well-known path prefix challenge files are served under.
pub const CHALLENGE_PATH_PREFIX: &str = "/.well-known/acme-challenge";

/// The payload the challenge server must have signed
#[derive(Debug, Deserialize)]
struct SimpleHttpPayload {
    #[serde(rename = "type")]
    payload_type: String,
    token: String,
    #[serde(default)]
    tls: Option<bool>,
}

impl ValidationAuthority {
    /// Validate a simpleHttp challenge against its identifier
    pub async fn validate_simple_http(
        &self,
        identifier: &Identifier,
        mut challenge: Challenge,
    ) -> Challenge {
        if !identifier.is_dns() {
            return fail(
                challenge,
                ProblemDetails::malformed("identifier type for SimpleHTTP challenge was not DNS"),
            );
        }
        if !challenge.token_is_sane() {
            return fail(
                challenge,
                ProblemDetails::malformed("challenge token is not sane"),
            );
        }
        let account_key = match challenge.account_key.clone() {
            Some(key) => key,
            None => {
                return fail(
                    challenge,
                    ProblemDetails::malformed("challenge has no account key"),
                )
            }
        };

        // Absent means TLS on; clients opt *out* of it explicitly.
        let use_tls = challenge.tls.unwrap_or(true);
        let port = if use_tls {
            self.config.ports.simple_https_port
        } else {
            self.config.ports.simple_http_port
        };
        if port == 0 {
            return fail(
                challenge,
                ProblemDetails::malformed("no port configured for SimpleHTTP(S) challenge"),
            );
        }

        let scheme = if use_tls { "https" } else { "http" };
        let url = format!(
            "{scheme}://{host}:{port}{CHALLENGE_PATH_PREFIX}/{token}",
            host = identifier.value,
            token = challenge.token,
        );

        self.log.audit(format!(
            "Attempting to validate {} for {}",
            if use_tls { "SimpleHTTPS" } else { "SimpleHTTP" },
            identifier.value,
        ));

        let fetcher = HttpFetcher::new(
            Arc::clone(&self.resolver),
            Arc::clone(&self.config),
            Arc::clone(&self.log),
        );
        let (records, outcome) = fetcher.fetch(&url).await;
        challenge.validation_record = records;

        let body = match outcome {
            Ok(body) => body,
            Err(e) => return fail(challenge, e.problem()),
        };

        let body_text = match std::str::from_utf8(&body) {
            Ok(text) => text.trim(),
            Err(_) => {
                return fail(
                    challenge,
                    ProblemDetails::unauthorized("validation response was not valid UTF-8"),
                )
            }
        };
        let jws = match crate::jws::Jws::parse_compact(body_text) {
            Ok(jws) => jws,
            Err(e) => {
                return fail(
                    challenge,
                    ProblemDetails::unauthorized(format!(
                        "validation response is not a compact JWS: {e}"
                    )),
                )
            }
        };
        if let Err(e) = jws.verify(&account_key) {
            return fail(
                challenge,
                ProblemDetails::unauthorized(format!(
                    "validation response signature did not verify: {e}"
                )),
            );
        }

        let payload: SimpleHttpPayload = match jws.payload_json() {
            Ok(payload) => payload,
            Err(e) => {
                return fail(
                    challenge,
                    ProblemDetails::unauthorized(format!(
                        "validation response payload was unreadable: {e}"
                    )),
                )
            }
        };
        if payload.payload_type != "simpleHttp" {
            return fail(
                challenge,
                ProblemDetails::unauthorized(format!(
                    "validation payload type was {:?}, expected \"simpleHttp\"",
                    payload.payload_type
                )),
            );
        }
        if payload.token != challenge.token {
            return fail(
                challenge,
                ProblemDetails::unauthorized("validation payload token did not match challenge"),
            );
        }
        if payload.tls.unwrap_or(true) != use_tls {
            return fail(
                challenge,
                ProblemDetails::unauthorized("validation payload tls flag did not match challenge"),
            );
        }

        succeed(challenge)
    }
}
