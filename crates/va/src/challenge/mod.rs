//! Challenge provers
//!
//! One module per challenge protocol, each implemented as methods on
//! [`ValidationAuthority`](crate::ValidationAuthority). Every prover
//! follows the same contract: sanity-check the identifier and challenge
//! shape before any network I/O, emit exactly one audit line per attempt,
//! and terminate the challenge as `valid` or `invalid` with a classified
//! problem — internal errors never escape.

mod dns;
mod dvsni;
mod simple_http;

pub use dvsni::dvsni_name;

use crate::problem::ProblemDetails;
use crate::types::{Challenge, ChallengeStatus};

/// Terminate a challenge as invalid with the given problem
pub(crate) fn fail(mut challenge: Challenge, problem: ProblemDetails) -> Challenge {
    challenge.status = ChallengeStatus::Invalid;
    challenge.error = Some(problem);
    challenge
}

/// Terminate a challenge as valid
pub(crate) fn succeed(mut challenge: Challenge) -> Challenge {
    challenge.status = ChallengeStatus::Valid;
    challenge.error = None;
    challenge
}
