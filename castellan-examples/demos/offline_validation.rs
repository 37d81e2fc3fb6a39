//! Issues an access token against a local PKI fixture, serves the
//! corresponding JWKS from an ephemeral in-process HTTP listener, and
//! validates the token the way a resource server would: fetch-once,
//! cache, verify offline — no callback to the issuer per request.

use std::path::Path;
use std::sync::Arc;

use axum::{routing::get, Json, Router};
use castellan_crypto::{jwk_set, FilePkiProvider, PkiKeyFile, PkiProvider};
use castellan_token::validator::{validate_jwt, JwksCache};
use castellan_token::TokenIssuer;

const ISSUER_URL: &str = "https://idp.example.test";
const AUDIENCE: &str = "orders-service";

async fn serve_jwks(pki: Arc<dyn PkiProvider>) -> std::io::Result<String> {
    let router = Router::new().route(
        "/jwks",
        get(move || {
            let pki = pki.clone();
            async move { Json(jwk_set(pki.as_ref()).expect("fixture always has a loaded key")) }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    Ok(format!("http://{addr}/jwks"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let pki: Arc<dyn PkiProvider> = Arc::new(FilePkiProvider::load(&[PkiKeyFile {
        id: "dev-rsa-1",
        cert_file: &fixtures.join("dev-cert.pem"),
        key_file: &fixtures.join("dev-key.pem"),
    }])?);

    let jwks_uri = serve_jwks(pki.clone()).await?;
    println!("serving jwks at {jwks_uri}");

    let issuer = TokenIssuer::new(pki, ISSUER_URL);
    let (access_token, claims) = issuer.issue_access_token("user-42", AUDIENCE, "orders-cli", "orders:read", None)?;
    println!("issued access_token for sub={} scope={:?}", claims.sub, claims.scope);

    let cache = JwksCache::new(jwks_uri, reqwest::Client::new());
    let validated = validate_jwt(&access_token, &cache, ISSUER_URL, AUDIENCE).await?;
    println!("validated offline: sub={:?} scope={:?}", validated.sub, validated.scope);

    println!("\nvalidating against the wrong audience (expect a validation error):");
    match validate_jwt(&access_token, &cache, ISSUER_URL, "some-other-service").await {
        Ok(_) => println!("unexpectedly succeeded"),
        Err(e) => println!("rejected as expected: {e}"),
    }

    Ok(())
}
