//! Offline, JWKS-based token validation for resource servers. A resource
//! server does not hold Castellan's private keys; it fetches the JWKS once,
//! caches it for a TTL, and validates bearer tokens against the cached
//! public keys without calling back to the issuer on every request.

use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::TokenError;

/// Minimal claim set every validated token is expected to carry.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub iss: Option<String>,
    pub sub: Option<String>,
    pub aud: Option<String>,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub jti: Option<String>,
    pub client_id: Option<String>,
    pub scope: Option<String>,
}

/// One entry of a fetched JWKS document. Covers the three key types
/// `castellan-oidc`'s `/oauth2/jwks` can emit.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: Option<String>,
    pub kty: String,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

impl Jwk {
    pub fn to_decoding_key(&self) -> Result<(DecodingKey, Algorithm), TokenError> {
        match self.kty.as_str() {
            "RSA" => {
                let n = self.n.as_deref().ok_or_else(|| {
                    TokenError::MalformedClaims("RSA JWK missing 'n'".to_string())
                })?;
                let e = self.e.as_deref().ok_or_else(|| {
                    TokenError::MalformedClaims("RSA JWK missing 'e'".to_string())
                })?;
                Ok((DecodingKey::from_rsa_components(n, e)?, Algorithm::RS256))
            }
            "EC" => {
                let x = self.x.as_deref().ok_or_else(|| {
                    TokenError::MalformedClaims("EC JWK missing 'x'".to_string())
                })?;
                let y = self.y.as_deref().ok_or_else(|| {
                    TokenError::MalformedClaims("EC JWK missing 'y'".to_string())
                })?;
                let alg = match self.crv.as_deref() {
                    Some("P-384") => Algorithm::ES384,
                    _ => Algorithm::ES256,
                };
                Ok((DecodingKey::from_ec_components(x, y)?, alg))
            }
            "OKP" => {
                let x = self.x.as_deref().ok_or_else(|| {
                    TokenError::MalformedClaims("OKP JWK missing 'x'".to_string())
                })?;
                Ok((DecodingKey::from_ed_components(x)?, Algorithm::EdDSA))
            }
            other => Err(TokenError::MalformedClaims(format!(
                "unsupported key type {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub async fn fetch(jwks_uri: &str, client: &reqwest::Client) -> Result<Self, TokenError> {
        let response = client
            .get(jwks_uri)
            .send()
            .await
            .map_err(|e| TokenError::MalformedClaims(format!("jwks fetch failed: {e}")))?;
        response
            .json::<Jwks>()
            .await
            .map_err(|e| TokenError::MalformedClaims(format!("jwks body invalid: {e}")))
    }

    pub fn find_key(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(id) => self.keys.iter().find(|k| k.kid.as_deref() == Some(id)),
            None => self.keys.first(),
        }
    }
}

/// A TTL-cached JWKS document, refreshed on expiry or on a cache miss (to
/// absorb key rotation).
pub struct JwksCache {
    jwks_uri: String,
    http_client: reqwest::Client,
    cached: RwLock<Option<(Jwks, Instant)>>,
    ttl: Duration,
}

impl JwksCache {
    #[must_use]
    pub fn new(jwks_uri: String, http_client: reqwest::Client) -> Self {
        Self {
            jwks_uri,
            http_client,
            cached: RwLock::new(None),
            ttl: Duration::from_secs(3600),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub async fn get_jwks(&self) -> Result<Jwks, TokenError> {
        {
            let guard = self.cached.read().await;
            if let Some((jwks, fetched_at)) = guard.as_ref() {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(jwks.clone());
                }
            }
        }
        self.refresh().await
    }

    pub async fn get_key(&self, kid: Option<&str>) -> Result<Option<Jwk>, TokenError> {
        let jwks = self.get_jwks().await?;
        if let Some(key) = jwks.find_key(kid) {
            return Ok(Some(key.clone()));
        }
        let jwks = self.refresh().await?;
        Ok(jwks.find_key(kid).cloned())
    }

    pub async fn refresh(&self) -> Result<Jwks, TokenError> {
        let mut guard = self.cached.write().await;
        let jwks = Jwks::fetch(&self.jwks_uri, &self.http_client).await?;
        *guard = Some((jwks.clone(), Instant::now()));
        Ok(jwks)
    }
}

/// Validates a bearer token against a cached JWKS, checking issuer and
/// audience. Never leaks the underlying validation failure reason to the
/// caller — only `TokenError` variants that are themselves safe to log.
pub async fn validate_jwt(
    token: &str,
    cache: &JwksCache,
    issuer: &str,
    audience: &str,
) -> Result<Claims, TokenError> {
    let header = decode_header(token)?;
    let jwk = cache
        .get_key(header.kid.as_deref())
        .await?
        .ok_or_else(|| TokenError::KeyNotFound(header.kid.clone().unwrap_or_default()))?;
    let (decoding_key, _alg) = jwk.to_decoding_key()?;

    let mut validation = Validation::new(header.alg);
    validation.set_issuer(std::slice::from_ref(&issuer.to_string()));
    validation.set_audience(std::slice::from_ref(&audience.to_string()));

    let data = decode::<Claims>(token, &decoding_key, &validation)?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsa_jwk_missing_modulus_is_malformed() {
        let jwk = Jwk {
            kid: Some("k1".into()),
            kty: "RSA".into(),
            alg: Some("RS256".into()),
            n: None,
            e: Some("AQAB".into()),
            crv: None,
            x: None,
            y: None,
        };
        assert!(matches!(
            jwk.to_decoding_key(),
            Err(TokenError::MalformedClaims(_))
        ));
    }

    #[test]
    fn unsupported_key_type_is_rejected() {
        let jwk = Jwk {
            kid: None,
            kty: "oct".into(),
            alg: None,
            n: None,
            e: None,
            crv: None,
            x: None,
            y: None,
        };
        assert!(matches!(
            jwk.to_decoding_key(),
            Err(TokenError::MalformedClaims(_))
        ));
    }
}
