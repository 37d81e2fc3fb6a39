//! `/oauth2/jwks` (RFC 7517): a thin wrapper over `castellan_crypto::jwk_set`
//! so the HTTP-framework crates depend on `castellan-oidc` uniformly for
//! every side endpoint, instead of reaching into `castellan-crypto` directly
//! for this one.

use std::sync::Arc;

use castellan_crypto::{jwk_set, JwkSet, PkiProvider};

use crate::error::OidcError;

pub fn jwks_document(provider: &Arc<dyn PkiProvider>) -> Result<JwkSet, OidcError> {
    Ok(jwk_set(provider.as_ref())?)
}
