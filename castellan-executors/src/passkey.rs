//! The passkey (WebAuthn) authenticator. Turn 1 returns a
//! creation/assertion challenge as `additionalData`; turn 2 validates the
//! signed assertion against a stored credential. The WebAuthn ceremony
//! itself (ECDSA/EdDSA signature verification, attestation parsing) is an
//! external collaborator, kept out of this crate alongside credential and
//! user storage.

use std::collections::HashMap;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::{AuthenticatedUser, UserType};

use crate::context::NodeContext;
use crate::executor::{Executor, ExecutorKind, ExecutorResponse};

/// The WebAuthn ceremony collaborator.
#[async_trait]
pub trait PasskeyCeremony: Send + Sync {
    /// Produce the challenge options JSON for the client's
    /// `navigator.credentials.get()` call, plus an opaque challenge id.
    async fn begin_assertion(&self, user_id: &str) -> Result<(String, serde_json::Value), AuthError>;

    /// Validate a signed assertion against the stored credential for the
    /// given challenge id.
    async fn verify_assertion(
        &self,
        challenge_id: &str,
        assertion: &serde_json::Value,
    ) -> Result<bool, AuthError>;
}

const CHALLENGE_KEY: &str = "passkey_challenge_id";

pub struct PasskeyExecutor<C> {
    ceremony: C,
}

impl<C: PasskeyCeremony> PasskeyExecutor<C> {
    pub fn new(ceremony: C) -> Self {
        Self { ceremony }
    }
}

#[async_trait]
impl<C: PasskeyCeremony> Executor for PasskeyExecutor<C> {
    fn name(&self) -> &str {
        "passkey"
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Authentication
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
        if !ctx.runtime_data.contains_key(CHALLENGE_KEY) {
            let Some(user_id) = ctx.authenticated_user.user_id.as_deref() else {
                return Ok(ExecutorResponse::failure(
                    "Prerequisites validation failed: no candidate user for passkey assertion",
                ));
            };
            let (challenge_id, options) = self.ceremony.begin_assertion(user_id).await?;
            let mut additional_data = HashMap::new();
            additional_data.insert("publicKeyCredentialRequestOptions".to_string(), options);
            let mut resp = ExecutorResponse::complete();
            resp.status = crate::executor::ExecStatus::Incomplete;
            resp.response_type = Some(crate::executor::ResponseType::View);
            resp.additional_data = additional_data;
            resp.runtime_data.insert(
                CHALLENGE_KEY.to_string(),
                serde_json::Value::String(challenge_id),
            );
            return Ok(resp);
        }

        let Some(assertion_raw) = ctx.input("assertion") else {
            return Ok(ExecutorResponse::failure("missing passkey assertion"));
        };
        let assertion: serde_json::Value = serde_json::from_str(assertion_raw)
            .map_err(|e| AuthError::Provider(format!("malformed assertion payload: {e}")))?;

        let challenge_id = ctx
            .runtime_data
            .get(CHALLENGE_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        if !self.ceremony.verify_assertion(challenge_id, &assertion).await? {
            return Ok(ExecutorResponse::failure("passkey assertion did not validate"));
        }

        let mut user = ctx.authenticated_user.clone();
        user.is_authenticated = true;
        if user.user_type.is_none() {
            user.user_type = Some(UserType::Standard);
        }
        Ok(ExecutorResponse::complete().with_authenticated_user(user))
    }
}
