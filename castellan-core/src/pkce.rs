//! PKCE (RFC 7636) generation and verification.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The code-challenge method a client declared at `/oauth2/authorize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChallengeMethod {
    Plain,
    S256,
}

impl ChallengeMethod {
    /// Parse the `code_challenge_method` query parameter. An empty/absent
    /// value defaults to `plain`.
    pub fn parse(raw: Option<&str>) -> Result<Self, PkceError> {
        match raw.unwrap_or("") {
            "" | "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PkceError {
    #[error("unsupported code_challenge_method: {0}")]
    UnsupportedMethod(String),
    #[error("code_verifier does not match code_challenge")]
    Mismatch,
    #[error("code_verifier length {0} is outside the 43-128 character range")]
    InvalidVerifierLength(usize),
}

/// A freshly-generated client-side PKCE pair, as a confidential client would
/// create it before redirecting to `/oauth2/authorize`.
pub struct Pkce {
    pub code_verifier: String,
    pub code_challenge: String,
}

impl Pkce {
    /// Generate a new S256 PKCE pair with a 43-character (32 random bytes,
    /// base64url) verifier.
    #[must_use]
    pub fn new() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let code_verifier = URL_SAFE_NO_PAD.encode(bytes);
        let code_challenge = s256(&code_verifier);
        Self {
            code_verifier,
            code_challenge,
        }
    }
}

impl Default for Pkce {
    fn default() -> Self {
        Self::new()
    }
}

fn s256(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Verify a `code_verifier` presented at `/oauth2/token` against the
/// `code_challenge` stored with the authorization code.
pub fn verify(
    method: ChallengeMethod,
    code_verifier: &str,
    code_challenge: &str,
) -> Result<(), PkceError> {
    if !(43..=128).contains(&code_verifier.len()) {
        return Err(PkceError::InvalidVerifierLength(code_verifier.len()));
    }
    let ok = match method {
        ChallengeMethod::S256 => s256(code_verifier) == code_challenge,
        ChallengeMethod::Plain => code_verifier == code_challenge,
    };
    if ok {
        Ok(())
    } else {
        Err(PkceError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_round_trip_succeeds() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        assert!(verify(ChallengeMethod::S256, verifier, challenge).is_ok());
    }

    #[test]
    fn s256_rejects_wrong_verifier_of_same_length() {
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";
        let wrong = "a".repeat(43);
        assert_eq!(
            verify(ChallengeMethod::S256, &wrong, challenge),
            Err(PkceError::Mismatch)
        );
    }

    #[test]
    fn plain_method_defaults_from_empty_string() {
        assert_eq!(ChallengeMethod::parse(Some("")).unwrap(), ChallengeMethod::Plain);
        assert_eq!(ChallengeMethod::parse(None).unwrap(), ChallengeMethod::Plain);
    }

    #[test]
    fn unsupported_method_is_rejected() {
        assert!(matches!(
            ChallengeMethod::parse(Some("S512")),
            Err(PkceError::UnsupportedMethod(_))
        ));
    }
}
