//! The federated (OIDC/OAuth — Google/GitHub/Discord) authenticator.
//! Turn 1 redirects to the provider's authorization endpoint
//! with `state`/`nonce`/PKCE; turn 2 exchanges the returned `code`,
//! validates the id_token when the provider speaks OIDC, and maps the
//! external subject to a local user.

use std::collections::HashMap;

use async_trait::async_trait;
use castellan_core::error::AuthError;
use castellan_core::state::Identity;
use castellan_core::{pkce::Pkce, AuthenticatedUser, OAuthProvider};
use rand::RngCore;

use crate::context::NodeContext;
use crate::executor::{Executor, ExecutorKind, ExecutorResponse};

/// Maps an external [`Identity`] to a local [`AuthenticatedUser`] record.
/// Distinct from `castellan_core::UserMapper` (which is generic over an
/// arbitrary local-user type for the standalone OAuth2 flow helpers) —
/// the flow engine needs the concrete engine-facing record directly.
#[async_trait]
pub trait FederatedUserMapper: Send + Sync {
    async fn map(&self, identity: &Identity) -> Result<AuthenticatedUser, AuthError>;
}

const STATE_KEY: &str = "federated_state";
const VERIFIER_KEY: &str = "federated_code_verifier";

pub struct FederatedExecutor<P, M> {
    name: &'static str,
    provider: P,
    mapper: M,
    scopes: Vec<&'static str>,
}

impl<P, M> FederatedExecutor<P, M>
where
    P: OAuthProvider,
    M: FederatedUserMapper,
{
    pub fn new(name: &'static str, provider: P, mapper: M, scopes: Vec<&'static str>) -> Self {
        Self {
            name,
            provider,
            mapper,
            scopes,
        }
    }

    fn random_token() -> String {
        let mut bytes = [0u8; 24];
        rand::rng().fill_bytes(&mut bytes);
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
    }
}

#[async_trait]
impl<P, M> Executor for FederatedExecutor<P, M>
where
    P: OAuthProvider,
    M: FederatedUserMapper,
{
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Authentication
    }

    async fn execute(&self, ctx: &NodeContext) -> Result<ExecutorResponse, AuthError> {
        let code = ctx.input("code");
        let returned_state = ctx.input("state");

        match (code, returned_state) {
            (Some(code), Some(returned_state)) => {
                let expected_state = ctx
                    .runtime_data
                    .get(STATE_KEY)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                if returned_state != expected_state {
                    return Err(AuthError::CsrfMismatch);
                }

                let verifier = ctx
                    .runtime_data
                    .get(VERIFIER_KEY)
                    .and_then(|v| v.as_str());

                let (identity, _token) = self
                    .provider
                    .exchange_code_for_identity(code, verifier)
                    .await?;

                let user = self.mapper.map(&identity).await?;
                Ok(ExecutorResponse::complete().with_authenticated_user(user))
            }
            _ => {
                let state = Self::random_token();
                let pkce = Pkce::new();
                let url = self.provider.get_authorization_url(
                    &state,
                    &self.scopes,
                    Some(&pkce.code_challenge),
                );

                let mut additional_data = HashMap::new();
                additional_data.insert("state".to_string(), serde_json::Value::String(state.clone()));

                let mut resp = ExecutorResponse::redirect(url, additional_data);
                resp.runtime_data
                    .insert(STATE_KEY.to_string(), serde_json::Value::String(state));
                resp.runtime_data.insert(
                    VERIFIER_KEY.to_string(),
                    serde_json::Value::String(pkce.code_verifier),
                );
                Ok(resp)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_core::state::OAuthToken;
    use castellan_core::AssuranceContext;

    struct FakeProvider;
    #[async_trait]
    impl OAuthProvider for FakeProvider {
        fn provider_id(&self) -> &str {
            "fake"
        }
        fn get_authorization_url(&self, state: &str, _scopes: &[&str], _c: Option<&str>) -> String {
            format!("https://provider.example/authorize?state={state}")
        }
        async fn exchange_code_for_identity(
            &self,
            code: &str,
            _verifier: Option<&str>,
        ) -> Result<(Identity, OAuthToken), AuthError> {
            Ok((
                Identity {
                    provider_id: "fake".into(),
                    external_id: format!("ext-{code}"),
                    email: None,
                    username: None,
                    attributes: HashMap::new(),
                },
                OAuthToken {
                    access_token: "at".into(),
                    token_type: "Bearer".into(),
                    expires_in: Some(3600),
                    refresh_token: None,
                    id_token: None,
                },
            ))
        }
    }

    struct FakeMapper;
    #[async_trait]
    impl FederatedUserMapper for FakeMapper {
        async fn map(&self, identity: &Identity) -> Result<AuthenticatedUser, AuthError> {
            Ok(AuthenticatedUser {
                is_authenticated: true,
                user_id: Some(identity.external_id.clone()),
                ..Default::default()
            })
        }
    }

    fn ctx(user_input: HashMap<String, String>, runtime: HashMap<String, serde_json::Value>) -> NodeContext {
        NodeContext {
            flow_id: "f1".into(),
            flow_type: castellan_core::FlowKind::Authentication,
            app_id: "app".into(),
            attempt: 1,
            user_input_data: user_input,
            runtime_data: runtime,
            additional_data: HashMap::new(),
            authenticated_user: AuthenticatedUser::default(),
            assurance: AssuranceContext::default(),
            user_eligible_for_provisioning: false,
        }
    }

    #[tokio::test]
    async fn first_turn_redirects_with_state() {
        let exec = FederatedExecutor::new("google", FakeProvider, FakeMapper, vec!["openid"]);
        let resp = exec.execute(&ctx(HashMap::new(), HashMap::new())).await.unwrap();
        assert_eq!(resp.response_type, Some(crate::executor::ResponseType::Redirection));
        assert!(resp.redirect_url.unwrap().contains("state="));
    }

    #[tokio::test]
    async fn mismatched_state_is_rejected() {
        let exec = FederatedExecutor::new("google", FakeProvider, FakeMapper, vec!["openid"]);
        let mut runtime = HashMap::new();
        runtime.insert(STATE_KEY.to_string(), serde_json::Value::String("expected".into()));
        let mut input = HashMap::new();
        input.insert("code".to_string(), "abc".to_string());
        input.insert("state".to_string(), "wrong".to_string());

        let err = exec.execute(&ctx(input, runtime)).await.unwrap_err();
        assert!(matches!(err, AuthError::CsrfMismatch));
    }

    #[tokio::test]
    async fn second_turn_exchanges_code_and_maps_user() {
        let exec = FederatedExecutor::new("google", FakeProvider, FakeMapper, vec!["openid"]);
        let mut runtime = HashMap::new();
        runtime.insert(STATE_KEY.to_string(), serde_json::Value::String("s1".into()));
        let mut input = HashMap::new();
        input.insert("code".to_string(), "abc".to_string());
        input.insert("state".to_string(), "s1".to_string());

        let resp = exec.execute(&ctx(input, runtime)).await.unwrap();
        assert!(resp.authenticated_user.unwrap().is_authenticated);
    }
}
