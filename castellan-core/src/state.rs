use crate::assurance::AssuranceContext;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A dynamic attribute value. Attribute maps on [`AuthenticatedUser`] and on
/// executor responses carry heterogeneous values; modelling the union as a
/// tagged sum (rather than stringly-typed JSON everywhere) lets consumers
/// like [`extract_group_ids`] be a total pattern match instead of a runtime
/// type assertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    StringList(Vec<String>),
    Opaque(serde_json::Value),
}

impl AttributeValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A unified identity returned by any federated provider, before it is
/// mapped to a local user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    /// e.g. `"google"`, `"github"`.
    pub provider_id: String,
    /// The subject id at the provider.
    pub external_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub attributes: HashMap<String, String>,
}

/// The token set returned by an OAuth2/OIDC provider during code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: Option<u64>,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
}

/// The tag distinguishing a local user's provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Standard,
    Service,
    Provisional,
}

/// The authenticated-user record threaded through a flow. The attribute map
/// is merged — never replaced — across successive node outputs; `user_id`
/// is write-once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub is_authenticated: bool,
    pub user_id: Option<String>,
    pub org_unit_id: Option<String>,
    pub user_type: Option<UserType>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `other` into `self` following its rules: the attribute
    /// map is merged (existing keys win unless absent), and `user_id` is
    /// write-once.
    pub fn merge(&mut self, other: Self) {
        if other.is_authenticated {
            self.is_authenticated = true;
        }
        if self.user_id.is_none() {
            self.user_id = other.user_id;
        }
        if self.org_unit_id.is_none() {
            self.org_unit_id = other.org_unit_id;
        }
        if self.user_type.is_none() {
            self.user_type = other.user_type;
        }
        for (k, v) in other.attributes {
            self.attributes.entry(k).or_insert(v);
        }
    }
}

/// Extract a list of group ids from an [`AttributeValue`], accepting three
/// equivalent shapes: a list of plain strings, a list of opaque items each
/// carrying an `id` field, or a single string.
#[must_use]
pub fn extract_group_ids(value: &AttributeValue) -> Vec<String> {
    match value {
        AttributeValue::String(s) => vec![s.clone()],
        AttributeValue::StringList(items) => items.clone(),
        AttributeValue::Opaque(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(map) => map
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        AttributeValue::Opaque(serde_json::Value::String(s)) => vec![s.clone()],
        AttributeValue::Opaque(_) => Vec::new(),
    }
}

/// A fully-populated context: the authenticated user plus the assurance
/// assertion computed from the factors engaged while producing it.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationOutcome {
    pub user: AuthenticatedUser,
    pub assurance: AssuranceContext,
}
