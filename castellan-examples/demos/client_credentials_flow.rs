//! Drives the `client_credentials` grant straight through
//! `castellan-oauth2::TokenService`, with no authorization code and no
//! flow engine involved — this is the machine-to-machine path a
//! confidential client (a backend service, not a browser) uses.

use std::path::Path;
use std::sync::Arc;

use castellan_crypto::{EncryptionService, FilePkiProvider, PkiKeyFile};
use castellan_oauth2::client::{GrantType, OAuth2Client, ResponseType, TokenEndpointAuthMethod};
use castellan_oauth2::code::AuthorizationCode;
use castellan_oauth2::repository::{ClientRepository, StoreClientRepository};
use castellan_oauth2::token::{TokenRequest, TokenService};
use castellan_store::memory::InMemoryStore;
use castellan_store::Store;
use castellan_token::TokenIssuer;

const ISSUER_URL: &str = "https://idp.example.test";
const AUDIENCE: &str = "billing-api";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let pki = Arc::new(FilePkiProvider::load(&[PkiKeyFile {
        id: "dev-rsa-1",
        cert_file: &fixtures.join("dev-cert.pem"),
        key_file: &fixtures.join("dev-key.pem"),
    }])?);
    let issuer = Arc::new(TokenIssuer::new(pki.clone(), ISSUER_URL));
    let secrets = Arc::new(EncryptionService::new("k1", &[9u8; 32])?);

    let client_store: InMemoryStore<OAuth2Client> = InMemoryStore::new();
    let clients = Arc::new(StoreClientRepository::new(client_store));
    let codes: Arc<dyn Store<AuthorizationCode>> = Arc::new(InMemoryStore::new());

    let client_secret = "s3cret-service-credential";
    let envelope = secrets.encrypt(client_secret)?;
    clients
        .insert(OAuth2Client {
            client_id: "billing-worker".to_string(),
            hashed_client_secret: Some(serde_json::to_string(&envelope)?),
            grant_types: vec![GrantType::ClientCredentials],
            response_types: vec![ResponseType::Code],
            redirect_uris: vec![],
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretPost,
            require_pkce: false,
            flow_graph_id: None,
            scopes: vec!["billing:read".to_string(), "billing:write".to_string()],
        })
        .await?;

    let service = TokenService::new(clients, codes, issuer, pki, secrets, ISSUER_URL, AUDIENCE);

    let request = TokenRequest {
        grant_type: "client_credentials".to_string(),
        client_id: Some("billing-worker".to_string()),
        client_secret: Some(client_secret.to_string()),
        scope: Some("billing:read".to_string()),
        ..Default::default()
    };

    let response = service.token(request).await?;
    println!(
        "issued access_token (scope={}, expires_in={}s, refresh_token={})",
        response.scope,
        response.expires_in,
        response.refresh_token.is_some()
    );
    println!("{}", response.access_token);

    println!("\nretrying with an over-broad scope (expect invalid_scope):");
    let escalated = TokenRequest {
        grant_type: "client_credentials".to_string(),
        client_id: Some("billing-worker".to_string()),
        client_secret: Some(client_secret.to_string()),
        scope: Some("billing:read billing:admin".to_string()),
        ..Default::default()
    };
    match service.token(escalated).await {
        Ok(_) => println!("unexpectedly succeeded"),
        Err(e) => println!("rejected as expected: {e}"),
    }

    Ok(())
}
