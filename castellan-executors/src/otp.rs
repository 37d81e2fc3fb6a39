//! The SMS/email one-time-code authenticator. Two-turn:
//! turn 1 sends a code and asks for it back; turn 2 validates it. Code
//! generation, TTL, and throttling are delegated entirely to the
//! `OtpChannel` collaborator — mail/SMS transport stays outside this crate.

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::{AuthenticatedUser, UserType};

use crate::context::NodeContext;
use crate::executor::{ExecStatus, Executor, ExecutorKind, ExecutorResponse, RequiredInput};

/// The abstract notification/OTP collaborator.
#[async_trait]
pub trait OtpChannel: Send + Sync {
    /// Generate and dispatch a one-time code to the identified user.
    /// Returns an opaque challenge id the second turn's `verify` call
    /// needs (e.g. to look up the code server-side).
    async fn send(&self, user_id: &str) -> Result<String, AuthError>;

    /// Validate the code the user submitted against the challenge issued
    /// by `send`.
    async fn verify(&self, challenge_id: &str, code: &str) -> Result<bool, AuthError>;
}

pub struct OtpExecutor<C> {
    channel: C,
}

impl<C: OtpChannel> OtpExecutor<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }
}

const CHALLENGE_KEY: &str = "otp_challenge_id";

#[async_trait]
impl<C: OtpChannel> Executor for OtpExecutor<C> {
    fn name(&self) -> &str {
        "sms-otp"
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Authentication
    }

    fn default_inputs(&self) -> Vec<RequiredInput> {
        vec![RequiredInput::required("code", "string")]
    }

    fn prerequisites(&self) -> Vec<&'static str> {
        vec![]
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
        let user_id = ctx.authenticated_user.user_id.as_deref();

        if !ctx.runtime_data.contains_key(CHALLENGE_KEY) {
            let Some(user_id) = user_id else {
                return Ok(ExecutorResponse::failure(
                    "Prerequisites validation failed: no authenticated user to notify",
                ));
            };
            let challenge_id = self.channel.send(user_id).await?;
            let mut resp = ExecutorResponse::needs_input(vec![RequiredInput::required(
                "code", "string",
            )]);
            resp.runtime_data
                .insert(CHALLENGE_KEY.to_string(), serde_json::Value::String(challenge_id));
            return Ok(resp);
        }

        let Some(code) = ctx.input("code") else {
            return Ok(ExecutorResponse::needs_input(vec![RequiredInput::required(
                "code", "string",
            )]));
        };

        let challenge_id = ctx
            .runtime_data
            .get(CHALLENGE_KEY)
            .and_then(|v| v.as_str())
            .unwrap_or_default();

        if !self.channel.verify(challenge_id, code).await? {
            return Ok(ExecutorResponse::failure("invalid or expired code"));
        }

        let mut user = ctx.authenticated_user.clone();
        user.is_authenticated = true;
        if user.user_type.is_none() {
            user.user_type = Some(UserType::Standard);
        }

        Ok(ExecutorResponse {
            status: ExecStatus::Complete,
            ..ExecutorResponse::complete()
        }
        .with_authenticated_user(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_core::AssuranceContext;
    use std::collections::HashMap;

    struct FakeChannel;
    #[async_trait]
    impl OtpChannel for FakeChannel {
        async fn send(&self, _user_id: &str) -> Result<String, AuthError> {
            Ok("challenge-1".to_string())
        }
        async fn verify(&self, challenge_id: &str, code: &str) -> Result<bool, AuthError> {
            Ok(challenge_id == "challenge-1" && code == "123456")
        }
    }

    fn base_ctx() -> NodeContext {
        NodeContext {
            flow_id: "f1".into(),
            flow_type: castellan_core::FlowKind::Authentication,
            app_id: "app".into(),
            attempt: 1,
            user_input_data: HashMap::new(),
            runtime_data: HashMap::new(),
            additional_data: HashMap::new(),
            authenticated_user: AuthenticatedUser {
                is_authenticated: false,
                user_id: Some("u1".into()),
                ..Default::default()
            },
            assurance: AssuranceContext::default(),
            user_eligible_for_provisioning: false,
        }
    }

    #[tokio::test]
    async fn first_turn_sends_code_and_requests_it() {
        let exec = OtpExecutor::new(FakeChannel);
        let resp = exec.execute(&base_ctx()).await.unwrap();
        assert_eq!(resp.status, ExecStatus::Incomplete);
        assert!(resp.runtime_data.contains_key(CHALLENGE_KEY));
    }

    #[tokio::test]
    async fn second_turn_validates_code() {
        let exec = OtpExecutor::new(FakeChannel);
        let mut ctx = base_ctx();
        ctx.runtime_data.insert(
            CHALLENGE_KEY.to_string(),
            serde_json::Value::String("challenge-1".into()),
        );
        ctx.user_input_data.insert("code".to_string(), "123456".to_string());

        let resp = exec.execute(&ctx).await.unwrap();
        assert_eq!(resp.status, ExecStatus::Complete);
        assert!(resp.authenticated_user.unwrap().is_authenticated);
    }

    #[tokio::test]
    async fn wrong_code_fails() {
        let exec = OtpExecutor::new(FakeChannel);
        let mut ctx = base_ctx();
        ctx.runtime_data.insert(
            CHALLENGE_KEY.to_string(),
            serde_json::Value::String("challenge-1".into()),
        );
        ctx.user_input_data.insert("code".to_string(), "000000".to_string());

        let resp = exec.execute(&ctx).await.unwrap();
        assert_eq!(resp.status, ExecStatus::Failure);
    }
}
