//! Validation orchestrator
//!
//! [`ValidationAuthority`] owns the pieces a validation needs — resolver,
//! configuration, log — and runs each validation on its own detached
//! task. The caller gets control back immediately; the registration
//! authority learns the outcome through its callback, exactly once per
//! run, whether the challenge succeeded, failed, or never got off the
//! ground.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};

use perimeter_common::ValidationLog;
use perimeter_config::VaConfig;

use crate::dns::DnsResolver;
use crate::types::{Authorization, Challenge, ChallengeType, Identifier};

/// Error a registration authority may return from its callback
///
/// The VA logs it and moves on; validation outcomes are never retried on
/// behalf of the RA.
#[derive(Debug, Error)]
#[error("registration authority rejected the update: {0}")]
pub struct RaError(pub String);

/// Receiver for completed validations
#[async_trait]
pub trait RegistrationAuthority: Send + Sync {
    /// Called once per validation run with the updated authorization
    ///
    /// The completed challenge sits at its original index. Implementations
    /// must tolerate concurrent calls from different validation tasks.
    async fn on_validation_update(&self, authorization: Authorization) -> Result<(), RaError>;
}

/// The validation authority
///
/// Cheap to clone; every clone shares the resolver, RA handle,
/// configuration, and log.
#[derive(Clone)]
pub struct ValidationAuthority {
    pub(crate) resolver: Arc<dyn DnsResolver>,
    ra: Arc<dyn RegistrationAuthority>,
    pub(crate) config: Arc<VaConfig>,
    pub(crate) log: Arc<ValidationLog>,
}

impl ValidationAuthority {
    pub fn new(
        config: VaConfig,
        resolver: Arc<dyn DnsResolver>,
        ra: Arc<dyn RegistrationAuthority>,
    ) -> Self {
        Self {
            resolver,
            ra,
            config: Arc::new(config),
            log: Arc::new(ValidationLog::new()),
        }
    }

    /// Share a log buffer owned by the caller
    pub fn with_log(mut self, log: Arc<ValidationLog>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &VaConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<ValidationLog> {
        &self.log
    }

    /// Schedule validation of one challenge and return immediately
    ///
    /// The selected challenge is validated on a detached task; the RA
    /// callback fires when it completes. Nothing here blocks on network
    /// I/O.
    pub fn update_validations(&self, authorization: Authorization, challenge_index: usize) {
        let va = self.clone();
        tokio::spawn(async move {
            va.perform_validation(authorization, challenge_index).await;
        });
    }

    /// Run one validation to completion
    ///
    /// This is the task body behind [`Self::update_validations`], exposed
    /// so embedders and tests can await the full flow deterministically.
    pub async fn perform_validation(&self, mut authorization: Authorization, index: usize) {
        let identifier = authorization.identifier.clone();

        match authorization.challenges.get(index).cloned() {
            Some(challenge) => {
                debug!(
                    authz = %authorization.id,
                    challenge = %challenge.challenge_type,
                    identifier = %identifier,
                    "starting validation"
                );
                let completed = self.validate_challenge(&identifier, challenge).await;
                authorization.challenges[index] = completed;
            }
            None => {
                // No challenge lives at this index, so there is nothing
                // to mark invalid; the callback below still fires so the
                // RA learns the run is over and consumed nothing.
                error!(
                    authz = %authorization.id,
                    index,
                    "validation requested for a challenge index that does not exist"
                );
            }
        }

        if let Err(e) = self.ra.on_validation_update(authorization).await {
            error!(error = %e, "failed to deliver validation update to the RA");
        }
    }

    /// Dispatch a challenge to its prover and return the completed record
    pub async fn validate_challenge(
        &self,
        identifier: &Identifier,
        challenge: Challenge,
    ) -> Challenge {
        match challenge.challenge_type {
            ChallengeType::SimpleHttp => self.validate_simple_http(identifier, challenge).await,
            ChallengeType::Dvsni => self.validate_dvsni(identifier, challenge).await,
            ChallengeType::Dns => self.validate_dns(identifier, challenge).await,
        }
    }
}

impl std::fmt::Debug for ValidationAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationAuthority")
            .field("config", &self.config)
            .finish()
    }
}
