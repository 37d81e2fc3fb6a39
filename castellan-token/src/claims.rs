//! Claim shapes for the three JWTs Castellan issues: access, refresh, and
//! (when `openid` is requested) ID tokens. All three are self-contained —
//! issued tokens are never persisted, so validation is always offline,
//! against the JWKS.

use serde::{Deserialize, Serialize};

/// Claims carried by an access token. `scope` is space-separated per
/// RFC 6749 §3.3; `client_id` is present for every grant (it is the
/// resource owner's client for `client_credentials`, and the authorizing
/// client otherwise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub client_id: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_id: Option<String>,
}

/// Claims carried by a refresh token. Deliberately minimal: a refresh token
/// only needs to prove who it was issued to and what scope it is allowed to
/// re-mint, not the full access-token claim set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub client_id: String,
    pub scope: String,
}

/// OIDC ID token claims (OIDC Core §2), populated from the assurance
/// context computed by the flow engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    pub auth_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Wire form of the computed AAL, e.g. `"AAL2"`.
    pub acr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_id: Option<String>,
}
