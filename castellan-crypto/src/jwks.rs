//! JWKS materialisation (RFC 7517): turns loaded PKI keys into the JSON Web
//! Key Set served at `/oauth2/jwks`.

use serde::Serialize;

use crate::pki::{PkiError, PkiKey, PkiProvider, PublicKeyMaterial};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kty")]
pub enum Jwk {
    #[serde(rename = "RSA")]
    Rsa {
        alg: &'static str,
        n: String,
        e: String,
        kid: String,
        x5c: Vec<String>,
        x5t: String,
        #[serde(rename = "x5t#S256")]
        x5t_s256: String,
    },
    #[serde(rename = "EC")]
    Ec {
        alg: &'static str,
        crv: &'static str,
        x: String,
        y: String,
        kid: String,
        x5c: Vec<String>,
        x5t: String,
        #[serde(rename = "x5t#S256")]
        x5t_s256: String,
    },
    #[serde(rename = "OKP")]
    Okp {
        alg: &'static str,
        crv: &'static str,
        x: String,
        kid: String,
        x5c: Vec<String>,
        x5t: String,
        #[serde(rename = "x5t#S256")]
        x5t_s256: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

fn to_jwk(key: &PkiKey) -> Jwk {
    let x5c = vec![key.certificate_der_b64.clone()];
    match &key.public_key {
        PublicKeyMaterial::Rsa(rsa) => Jwk::Rsa {
            alg: key.algorithm.wire(),
            n: rsa.n.clone(),
            e: rsa.e.clone(),
            kid: key.kid.clone(),
            x5c,
            x5t: key.x5t.clone(),
            x5t_s256: key.x5t_s256.clone(),
        },
        PublicKeyMaterial::Ec(ec) => Jwk::Ec {
            alg: key.algorithm.wire(),
            crv: ec.crv,
            x: ec.x.clone(),
            y: ec.y.clone(),
            kid: key.kid.clone(),
            x5c,
            x5t: key.x5t.clone(),
            x5t_s256: key.x5t_s256.clone(),
        },
        PublicKeyMaterial::Okp(okp) => Jwk::Okp {
            alg: key.algorithm.wire(),
            crv: okp.crv,
            x: okp.x.clone(),
            kid: key.kid.clone(),
            x5c,
            x5t: key.x5t.clone(),
            x5t_s256: key.x5t_s256.clone(),
        },
    }
}

/// Build the JWKS document from every key the provider exposes. Every loaded
/// key in `PkiProvider::keys` currently resolves to a supported JWK shape
/// (RSA/EC/OKP); an empty provider yields `NoCertificateFound`.
pub fn jwk_set(provider: &dyn PkiProvider) -> Result<JwkSet, PkiError> {
    let keys: Vec<Jwk> = provider.keys().iter().map(|k| to_jwk(k)).collect();
    if keys.is_empty() {
        return Err(PkiError::NoCertificateFound);
    }
    Ok(JwkSet { keys })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::{pem_to_der, FilePkiProvider, PkiKeyFile};
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use sha2::{Digest, Sha256};
    use std::path::Path;

    fn thumbprint(cert_pem_path: &Path) -> String {
        let cert_pem = std::fs::read_to_string(cert_pem_path).unwrap();
        let der = pem_to_der(&cert_pem).unwrap();
        URL_SAFE_NO_PAD.encode(Sha256::digest(&der))
    }

    #[test]
    fn empty_provider_yields_no_certificate_found() {
        let provider = FilePkiProvider::load(&[] as &[PkiKeyFile<'_>]).unwrap();
        assert!(matches!(
            jwk_set(&provider),
            Err(PkiError::NoCertificateFound)
        ));
    }

    #[test]
    fn missing_key_file_surfaces_io_error() {
        let entries = [PkiKeyFile {
            id: "missing",
            cert_file: Path::new("/nonexistent/cert.pem"),
            key_file: Path::new("/nonexistent/key.pem"),
        }];
        assert!(matches!(
            FilePkiProvider::load(&entries),
            Err(PkiError::Io { .. })
        ));
    }

    #[test]
    fn rsa_key_materialises_to_one_rsa_jwk_with_kid_equal_to_thumbprint() {
        let entries = [PkiKeyFile {
            id: "rsa-test",
            cert_file: Path::new("testdata/rsa_cert.pem"),
            key_file: Path::new("testdata/rsa_key.pem"),
        }];
        let provider = FilePkiProvider::load(&entries).unwrap();
        let set = jwk_set(&provider).unwrap();
        assert_eq!(set.keys.len(), 1);
        let expected_kid = thumbprint(Path::new("testdata/rsa_cert.pem"));
        match &set.keys[0] {
            Jwk::Rsa { alg, n, e, kid, x5c, .. } => {
                assert_eq!(*alg, "RS256");
                assert!(!n.is_empty());
                assert!(!e.is_empty());
                assert_eq!(kid, &expected_kid);
                assert_eq!(x5c.len(), 1);
            }
            other => panic!("expected an RSA JWK, got {other:?}"),
        }
    }

    #[test]
    fn mixed_keys_materialise_one_jwk_each() {
        let entries = [
            PkiKeyFile {
                id: "rsa-test",
                cert_file: Path::new("testdata/rsa_cert.pem"),
                key_file: Path::new("testdata/rsa_key.pem"),
            },
            PkiKeyFile {
                id: "ed25519-test",
                cert_file: Path::new("testdata/ed25519_cert.pem"),
                key_file: Path::new("testdata/ed25519_key.pem"),
            },
        ];
        let provider = FilePkiProvider::load(&entries).unwrap();
        let set = jwk_set(&provider).unwrap();
        assert_eq!(set.keys.len(), 2);
        let rsa_kid = thumbprint(Path::new("testdata/rsa_cert.pem"));
        let ed25519_kid = thumbprint(Path::new("testdata/ed25519_cert.pem"));
        assert!(set
            .keys
            .iter()
            .any(|k| matches!(k, Jwk::Rsa { kid, .. } if kid == &rsa_kid)));
        assert!(set
            .keys
            .iter()
            .any(|k| matches!(k, Jwk::Okp { kid, .. } if kid == &ed25519_kid)));
    }
}
