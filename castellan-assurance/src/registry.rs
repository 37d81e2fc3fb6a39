//! Process-wide authenticator registry.
//!
//! Populated once at bootstrap via [`AuthenticatorRegistry::register`];
//! read-mostly thereafter. Internally an
//! `RwLock` rather than a plain map so a misbehaving late registration is a
//! logic error surfaced at the call site, not a data race.

use std::collections::HashMap;
use std::sync::RwLock;

use castellan_core::AuthenticatorMeta;

#[derive(Default)]
pub struct AuthenticatorRegistry {
    by_name: RwLock<HashMap<String, AuthenticatorMeta>>,
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an authenticator's static metadata. Intended
    /// for bootstrap only; see module docs.
    pub fn register(&self, meta: AuthenticatorMeta) {
        self.by_name
            .write()
            .expect("authenticator registry lock poisoned")
            .insert(meta.name.clone(), meta);
    }

    pub fn lookup(&self, name: &str) -> Option<AuthenticatorMeta> {
        self.by_name
            .read()
            .expect("authenticator registry lock poisoned")
            .get(name)
            .cloned()
    }

    /// Find the (first) authenticator associated with a federated IdP type
    /// (e.g. `"google"`, `"github"`).
    pub fn lookup_by_idp(&self, idp_type: &str) -> Option<AuthenticatorMeta> {
        self.by_name
            .read()
            .expect("authenticator registry lock poisoned")
            .values()
            .find(|meta| meta.idp_type.as_deref() == Some(idp_type))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use castellan_core::AuthenticationFactor;

    #[test]
    fn registers_and_looks_up_by_name_and_idp_type() {
        let registry = AuthenticatorRegistry::new();
        registry.register(AuthenticatorMeta {
            name: "google".into(),
            factors: vec![AuthenticationFactor::Knowledge],
            idp_type: Some("google".into()),
        });

        assert!(registry.lookup("google").is_some());
        assert!(registry.lookup_by_idp("google").is_some());
        assert!(registry.lookup("github").is_none());
    }
}
