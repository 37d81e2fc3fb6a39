//! RFC 8693 token exchange: a confidential "gateway" client swaps one of
//! this server's own previously issued access tokens for a narrower-scoped
//! one, the way an API gateway mints a downstream-service-scoped token on
//! a caller's behalf without involving the flow engine again.

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
const AUDIENCE: &str = "internal-gateway";
const SUBJECT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    let pki = Arc::new(FilePkiProvider::load(&[PkiKeyFile {
        id: "dev-rsa-1",
        cert_file: &fixtures.join("dev-cert.pem"),
        key_file: &fixtures.join("dev-key.pem"),
    }])?);
    let issuer = Arc::new(TokenIssuer::new(pki.clone(), ISSUER_URL));
    let secrets = Arc::new(EncryptionService::new("k1", &[3u8; 32])?);

    let client_store: InMemoryStore<OAuth2Client> = InMemoryStore::new();
    let clients = Arc::new(StoreClientRepository::new(client_store));
    let codes: Arc<dyn Store<AuthorizationCode>> = Arc::new(InMemoryStore::new());

    let mobile_app_secret = "mobile-app-backend-credential";
    let mobile_app_envelope = secrets.encrypt(mobile_app_secret)?;
    clients
        .insert(OAuth2Client {
            client_id: "mobile-app".to_string(),
            hashed_client_secret: Some(serde_json::to_string(&mobile_app_envelope)?),
            grant_types: vec![GrantType::ClientCredentials],
            response_types: vec![ResponseType::Code],
            redirect_uris: vec![],
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretPost,
            require_pkce: false,
            flow_graph_id: None,
            scopes: vec!["profile:read".to_string(), "orders:read".to_string(), "orders:write".to_string()],
        })
        .await?;
    clients
        .insert(OAuth2Client {
            client_id: "api-gateway".to_string(),
            hashed_client_secret: None,
            grant_types: vec![GrantType::TokenExchange],
            response_types: vec![ResponseType::Code],
            redirect_uris: vec![],
            token_endpoint_auth_method: TokenEndpointAuthMethod::None,
            require_pkce: false,
            flow_graph_id: None,
            scopes: vec!["profile:read".to_string(), "orders:read".to_string()],
        })
        .await?;

    let service = TokenService::new(clients, codes, issuer, pki, secrets, ISSUER_URL, AUDIENCE);

    // Mint the original, broadly-scoped token as if the mobile app had
    // just completed an authorization_code redemption.
    let original = service
        .token(TokenRequest {
            grant_type: "client_credentials".to_string(),
            client_id: Some("mobile-app".to_string()),
            client_secret: Some(mobile_app_secret.to_string()),
            scope: Some("profile:read orders:read orders:write".to_string()),
            ..Default::default()
        })
        .await?;
    println!("original access_token scope={}", original.scope);

    // The gateway exchanges it for a narrower token scoped to just the
    // read permission it actually needs to call the orders service.
    let exchanged = service
        .token(TokenRequest {
            grant_type: "urn:ietf:params:oauth:grant-type:token-exchange".to_string(),
            client_id: Some("api-gateway".to_string()),
            subject_token: Some(original.access_token.clone()),
            subject_token_type: Some(SUBJECT_TOKEN_TYPE.to_string()),
            scope: Some("orders:read".to_string()),
            ..Default::default()
        })
        .await?;
    println!(
        "exchanged access_token scope={} issued_token_type={:?}",
        exchanged.scope, exchanged.issued_token_type
    );

    println!("\nrequesting a scope the original token never had (expect invalid_scope):");
    let over_broad = service
        .token(TokenRequest {
            grant_type: "urn:ietf:params:oauth:grant-type:token-exchange".to_string(),
            client_id: Some("api-gateway".to_string()),
            subject_token: Some(original.access_token),
            subject_token_type: Some(SUBJECT_TOKEN_TYPE.to_string()),
            scope: Some("admin:all".to_string()),
            ..Default::default()
        })
        .await;
    match over_broad {
        Ok(_) => println!("unexpectedly succeeded"),
        Err(e) => println!("rejected as expected: {e}"),
    }

    Ok(())
}
