//! # Castellan Crypto
//!
//! Two cryptographic singletons: an AES-256-GCM envelope service
//! for secrets at rest, and a PKI provider boundary for algorithm-agile
//! JWT signing (RSA/ECDSA/EdDSA) plus JWKS materialisation. The concrete
//! KMS backing `PkiProvider` is always an external collaborator; this crate
//! ships `FilePkiProvider`, a PEM-file-backed implementation, as the default.

#![allow(missing_docs)]

/// AES-256-GCM encrypt-at-rest envelope for client secrets and similar
/// at-rest values.
pub mod envelope;

/// PKI key loading and the `PkiProvider` boundary.
pub mod pki;

/// JWKS (RFC 7517) materialisation from loaded PKI keys.
pub mod jwks;

pub use envelope::{EncryptionEnvelope, EncryptionError, EncryptionService};
pub use jwks::{jwk_set, Jwk, JwkSet};
pub use pki::{
    FilePkiProvider, PkiError, PkiKey, PkiKeyFile, PkiProvider, PublicKeyMaterial,
    SigningAlgorithm,
};
