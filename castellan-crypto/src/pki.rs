//! PKI key material and algorithm-agile JWT signing.
//!
//! The concrete KMS is an external collaborator; this module only
//! defines the boundary — `PkiProvider` — and one default implementation,
//! `FilePkiProvider`, that loads PEM certificate/key pairs named in
//! configuration (`PKI key list [{id, certFile, keyFile}]`). A
//! deployment backed by a cloud KMS or HSM implements `PkiProvider` itself
//! and is never modelled here.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::pkcs8::DecodePrivateKey as EdDecodePrivateKey;
use ed25519_dalek::SigningKey as Ed25519SigningKey;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use p256::pkcs8::DecodePrivateKey as P256DecodePrivateKey;
use p384::pkcs8::DecodePrivateKey as P384DecodePrivateKey;
use rsa::pkcs8::DecodePrivateKey as RsaDecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

#[derive(Debug, Error)]
pub enum PkiError {
    #[error("could not read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported or malformed private key in {0}")]
    InvalidKey(String),
    #[error("unsupported or malformed certificate in {0}")]
    InvalidCertificate(String),
    #[error("no certificate loaded for key id {0}")]
    KeyNotFound(String),
    #[error("no supported JWK could be derived from any loaded certificate")]
    NoCertificateFound,
}

/// The signing algorithm families the JWKS endpoint must describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Rs256,
    Es256,
    Es384,
    EdDsa,
}

impl SigningAlgorithm {
    pub fn jsonwebtoken_algorithm(self) -> Algorithm {
        match self {
            SigningAlgorithm::Rs256 => Algorithm::RS256,
            SigningAlgorithm::Es256 => Algorithm::ES256,
            SigningAlgorithm::Es384 => Algorithm::ES384,
            SigningAlgorithm::EdDsa => Algorithm::EdDSA,
        }
    }

    pub fn wire(self) -> &'static str {
        match self {
            SigningAlgorithm::Rs256 => "RS256",
            SigningAlgorithm::Es256 => "ES256",
            SigningAlgorithm::Es384 => "ES384",
            SigningAlgorithm::EdDsa => "EdDSA",
        }
    }
}

/// RSA public-key material, kept in the shape JWKS serialisation wants
/// (modulus and exponent as unpadded base64url).
pub struct RsaPublicParts {
    pub n: String,
    pub e: String,
}

/// EC public-key material: uncompressed point coordinates, unpadded base64url.
pub struct EcPublicParts {
    pub crv: &'static str,
    pub x: String,
    pub y: String,
}

/// OKP (EdDSA) public-key material.
pub struct OkpPublicParts {
    pub crv: &'static str,
    pub x: String,
}

/// The algorithm-tagged public-key shape a JWK is built from.
pub enum PublicKeyMaterial {
    Rsa(RsaPublicParts),
    Ec(EcPublicParts),
    Okp(OkpPublicParts),
}

/// One loaded signing key plus its certificate, keyed by `kid`.
pub struct PkiKey {
    pub kid: String,
    pub algorithm: SigningAlgorithm,
    pub encoding_key: EncodingKey,
    pub decoding_key: DecodingKey,
    pub public_key: PublicKeyMaterial,
    /// DER-encoded certificate, base64-standard-encoded, for JWK `x5c`.
    pub certificate_der_b64: String,
    pub x5t: String,
    pub x5t_s256: String,
}

/// The PKI boundary: exposes private keys and certificate thumbprints by
/// key id. A cloud KMS / HSM-backed deployment implements this trait
/// directly instead of using `FilePkiProvider`.
pub trait PkiProvider: Send + Sync {
    fn keys(&self) -> &[Arc<PkiKey>];
    fn key(&self, kid: &str) -> Option<Arc<PkiKey>>;
    /// The key used to sign newly issued tokens when none is specified.
    fn active_key(&self) -> Option<Arc<PkiKey>>;
}

/// Loads RSA / ECDSA (P-256, P-384) / Ed25519 PEM key pairs named by
/// configuration's `[{id, certFile, keyFile}]` list.
pub struct FilePkiProvider {
    keys: Vec<Arc<PkiKey>>,
    by_kid: HashMap<String, Arc<PkiKey>>,
    active_kid: Option<String>,
}

/// One configured `{id, certFile, keyFile}` entry.
pub struct PkiKeyFile<'a> {
    pub id: &'a str,
    pub cert_file: &'a Path,
    pub key_file: &'a Path,
}

impl FilePkiProvider {
    pub fn load(entries: &[PkiKeyFile<'_>]) -> Result<Self, PkiError> {
        let mut keys = Vec::with_capacity(entries.len());
        let mut by_kid = HashMap::with_capacity(entries.len());
        let mut active_kid = None;

        for entry in entries {
            let key = load_one(entry)?;
            let key = Arc::new(key);
            if active_kid.is_none() {
                active_kid = Some(key.kid.clone());
            }
            by_kid.insert(key.kid.clone(), key.clone());
            keys.push(key);
        }

        Ok(Self {
            keys,
            by_kid,
            active_kid,
        })
    }
}

impl PkiProvider for FilePkiProvider {
    fn keys(&self) -> &[Arc<PkiKey>] {
        &self.keys
    }

    fn key(&self, kid: &str) -> Option<Arc<PkiKey>> {
        self.by_kid.get(kid).cloned()
    }

    fn active_key(&self) -> Option<Arc<PkiKey>> {
        self.active_kid.as_ref().and_then(|kid| self.key(kid))
    }
}

fn load_one(entry: &PkiKeyFile<'_>) -> Result<PkiKey, PkiError> {
    let key_pem = fs::read_to_string(entry.key_file).map_err(|source| PkiError::Io {
        path: entry.key_file.display().to_string(),
        source,
    })?;
    let cert_pem = fs::read_to_string(entry.cert_file).map_err(|source| PkiError::Io {
        path: entry.cert_file.display().to_string(),
        source,
    })?;

    let cert_der = pem_to_der(&cert_pem)
        .ok_or_else(|| PkiError::InvalidCertificate(entry.cert_file.display().to_string()))?;
    let (_, certificate) = X509Certificate::from_der(&cert_der)
        .map_err(|_| PkiError::InvalidCertificate(entry.cert_file.display().to_string()))?;
    let _ = certificate;

    let x5t = URL_SAFE_NO_PAD.encode(sha1_digest(&cert_der));
    let x5t_s256 = URL_SAFE_NO_PAD.encode(Sha256::digest(&cert_der));
    let certificate_der_b64 =
        base64::engine::general_purpose::STANDARD.encode(&cert_der);

    if let Ok(private_key) = RsaPrivateKey::from_pkcs8_pem(&key_pem) {
        let public = private_key.to_public_key();
        let encoding_key = EncodingKey::from_rsa_pem(key_pem.as_bytes())
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(cert_pem.as_bytes())
            .or_else(|_| DecodingKey::from_rsa_pem(key_pem.as_bytes()))
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;

        let n = URL_SAFE_NO_PAD.encode(public.n().to_bytes_be());
        let e = encode_rsa_exponent(&public.e().to_bytes_be());

        return Ok(PkiKey {
            kid: x5t_s256.clone(),
            algorithm: SigningAlgorithm::Rs256,
            encoding_key,
            decoding_key,
            public_key: PublicKeyMaterial::Rsa(RsaPublicParts { n, e }),
            certificate_der_b64,
            x5t,
            x5t_s256,
        });
    }

    if let Ok(private_key) = p256::SecretKey::from_pkcs8_pem(&key_pem) {
        let point = private_key.public_key().to_encoded_point(false);
        let (x, y) = (
            point.x().ok_or_else(|| PkiError::InvalidKey(entry.key_file.display().to_string()))?,
            point.y().ok_or_else(|| PkiError::InvalidKey(entry.key_file.display().to_string()))?,
        );
        let encoding_key = EncodingKey::from_ec_pem(key_pem.as_bytes())
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;
        let decoding_key = DecodingKey::from_ec_pem(cert_pem.as_bytes())
            .or_else(|_| DecodingKey::from_ec_pem(key_pem.as_bytes()))
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;

        return Ok(PkiKey {
            kid: x5t_s256.clone(),
            algorithm: SigningAlgorithm::Es256,
            encoding_key,
            decoding_key,
            public_key: PublicKeyMaterial::Ec(EcPublicParts {
                crv: "P-256",
                x: URL_SAFE_NO_PAD.encode(x),
                y: URL_SAFE_NO_PAD.encode(y),
            }),
            certificate_der_b64,
            x5t,
            x5t_s256,
        });
    }

    if let Ok(private_key) = p384::SecretKey::from_pkcs8_pem(&key_pem) {
        let point = private_key.public_key().to_encoded_point(false);
        let (x, y) = (
            point.x().ok_or_else(|| PkiError::InvalidKey(entry.key_file.display().to_string()))?,
            point.y().ok_or_else(|| PkiError::InvalidKey(entry.key_file.display().to_string()))?,
        );
        let encoding_key = EncodingKey::from_ec_pem(key_pem.as_bytes())
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;
        let decoding_key = DecodingKey::from_ec_pem(cert_pem.as_bytes())
            .or_else(|_| DecodingKey::from_ec_pem(key_pem.as_bytes()))
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;

        return Ok(PkiKey {
            kid: x5t_s256.clone(),
            algorithm: SigningAlgorithm::Es384,
            encoding_key,
            decoding_key,
            public_key: PublicKeyMaterial::Ec(EcPublicParts {
                crv: "P-384",
                x: URL_SAFE_NO_PAD.encode(x),
                y: URL_SAFE_NO_PAD.encode(y),
            }),
            certificate_der_b64,
            x5t,
            x5t_s256,
        });
    }

    if let Ok(signing_key) = Ed25519SigningKey::from_pkcs8_pem(&key_pem) {
        let verifying_key = signing_key.verifying_key();
        let encoding_key = EncodingKey::from_ed_pem(key_pem.as_bytes())
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;
        let decoding_key = DecodingKey::from_ed_pem(cert_pem.as_bytes())
            .or_else(|_| DecodingKey::from_ed_pem(key_pem.as_bytes()))
            .map_err(|_| PkiError::InvalidKey(entry.key_file.display().to_string()))?;

        return Ok(PkiKey {
            kid: x5t_s256.clone(),
            algorithm: SigningAlgorithm::EdDsa,
            encoding_key,
            decoding_key,
            public_key: PublicKeyMaterial::Okp(OkpPublicParts {
                crv: "Ed25519",
                x: URL_SAFE_NO_PAD.encode(verifying_key.to_bytes()),
            }),
            certificate_der_b64,
            x5t,
            x5t_s256,
        });
    }

    Err(PkiError::InvalidKey(entry.key_file.display().to_string()))
}

/// Unpadded base64url of an RSA public exponent. A zero exponent (never
/// valid for a real key, but the JWKS edge case spec.md §8 calls out)
/// encodes to `"AA"` rather than the empty string.
fn encode_rsa_exponent(e_bytes: &[u8]) -> String {
    if e_bytes.iter().all(|b| *b == 0) {
        "AA".to_string()
    } else {
        URL_SAFE_NO_PAD.encode(e_bytes)
    }
}

fn sha1_digest(data: &[u8]) -> Vec<u8> {
    use sha1::Digest as _;
    Sha1::digest(data).to_vec()
}

pub(crate) fn pem_to_der(pem: &str) -> Option<Vec<u8>> {
    let body: String = pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rsa_exponent_encodes_to_aa() {
        assert_eq!(encode_rsa_exponent(&[0, 0, 0]), "AA");
        assert_eq!(encode_rsa_exponent(&[]), "AA");
    }

    #[test]
    fn nonzero_rsa_exponent_encodes_normally() {
        // 65537 (0x010001), the conventional RSA public exponent.
        assert_eq!(encode_rsa_exponent(&[0x01, 0x00, 0x01]), "AQAB");
    }

    fn entry<'a>(id: &'a str, cert: &'a Path, key: &'a Path) -> PkiKeyFile<'a> {
        PkiKeyFile {
            id,
            cert_file: cert,
            key_file: key,
        }
    }

    #[test]
    fn loads_rsa_key_pair_as_rs256() {
        let provider = FilePkiProvider::load(&[entry(
            "rsa-test",
            Path::new("testdata/rsa_cert.pem"),
            Path::new("testdata/rsa_key.pem"),
        )])
        .unwrap();
        let key = provider.active_key().unwrap();
        assert_eq!(key.algorithm, SigningAlgorithm::Rs256);
        assert!(matches!(key.public_key, PublicKeyMaterial::Rsa(_)));
        assert!(!key.x5t.is_empty());
        assert!(!key.x5t_s256.is_empty());
        assert!(provider.key(&key.kid).is_some());
    }

    #[test]
    fn loads_ec_p256_key_pair_as_es256() {
        let provider = FilePkiProvider::load(&[entry(
            "ec256-test",
            Path::new("testdata/ec256_cert.pem"),
            Path::new("testdata/ec256_key.pem"),
        )])
        .unwrap();
        let key = provider.active_key().unwrap();
        assert_eq!(key.algorithm, SigningAlgorithm::Es256);
        match &key.public_key {
            PublicKeyMaterial::Ec(ec) => assert_eq!(ec.crv, "P-256"),
            _ => panic!("expected EC public key material"),
        }
    }

    #[test]
    fn loads_ec_p384_key_pair_as_es384() {
        let provider = FilePkiProvider::load(&[entry(
            "ec384-test",
            Path::new("testdata/ec384_cert.pem"),
            Path::new("testdata/ec384_key.pem"),
        )])
        .unwrap();
        let key = provider.active_key().unwrap();
        assert_eq!(key.algorithm, SigningAlgorithm::Es384);
        match &key.public_key {
            PublicKeyMaterial::Ec(ec) => assert_eq!(ec.crv, "P-384"),
            _ => panic!("expected EC public key material"),
        }
    }

    #[test]
    fn loads_ed25519_key_pair_as_eddsa() {
        let provider = FilePkiProvider::load(&[entry(
            "ed25519-test",
            Path::new("testdata/ed25519_cert.pem"),
            Path::new("testdata/ed25519_key.pem"),
        )])
        .unwrap();
        let key = provider.active_key().unwrap();
        assert_eq!(key.algorithm, SigningAlgorithm::EdDsa);
        match &key.public_key {
            PublicKeyMaterial::Okp(okp) => assert_eq!(okp.crv, "Ed25519"),
            _ => panic!("expected OKP public key material"),
        }
    }

    #[test]
    fn first_loaded_key_becomes_the_active_key() {
        let provider = FilePkiProvider::load(&[
            entry(
                "rsa-test",
                Path::new("testdata/rsa_cert.pem"),
                Path::new("testdata/rsa_key.pem"),
            ),
            entry(
                "ec256-test",
                Path::new("testdata/ec256_cert.pem"),
                Path::new("testdata/ec256_key.pem"),
            ),
        ])
        .unwrap();
        let rsa_key = provider.key(&provider.active_key().unwrap().kid).unwrap();
        assert_eq!(rsa_key.algorithm, SigningAlgorithm::Rs256);
        assert_eq!(provider.active_key().unwrap().kid, rsa_key.kid);
    }

    #[test]
    fn unknown_key_id_resolves_to_none() {
        let provider = FilePkiProvider::load(&[] as &[PkiKeyFile<'_>]).unwrap();
        assert!(provider.key("does-not-exist").is_none());
        assert!(provider.active_key().is_none());
    }
}
