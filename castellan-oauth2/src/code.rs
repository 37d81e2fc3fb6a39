//! The single-use `AuthorizationCode` record.

use castellan_core::AssuranceContext;
use castellan_core::pkce::ChallengeMethod;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Authorization codes are short-lived by design; capped at ten minutes.
pub const AUTHORIZATION_CODE_TTL: Duration = Duration::from_secs(600);

/// A single-use authorization code, stored between `/oauth2/authorize` and
/// its redemption at `/oauth2/token`. Consumed atomically via
/// `Store::take`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<ChallengeMethod>,
    pub subject: String,
    pub assurance: AssuranceContext,
    pub auth_time: DateTime<Utc>,
    pub nonce: Option<String>,
}
