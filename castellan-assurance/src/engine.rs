//! Assurance computation and verification.

use std::collections::HashSet;

use castellan_core::error::AssuranceError;
use castellan_core::{Aal, AssuranceContext, AuthenticationFactor, AuthenticatorMeta, Ial, Level};
use chrono::Utc;

use crate::registry::AuthenticatorRegistry;

/// Computes and verifies [`AssuranceContext`]s against the authenticator
/// registry. Stateless beyond the registry reference; safe to share.
pub struct AssuranceEngine<'a> {
    registry: &'a AuthenticatorRegistry,
}

impl<'a> AssuranceEngine<'a> {
    pub fn new(registry: &'a AuthenticatorRegistry) -> Self {
        Self { registry }
    }

    /// Derive AAL/IAL from the deduplicated engaged-factor set. IAL is
    /// always IAL1 until identity-proofing integration
    /// lands (an explicit extension point, not implemented here).
    pub fn compute(&self, ctx: &AssuranceContext) -> AssuranceContext {
        let mut seen_authenticators = HashSet::new();
        let mut engaged_factors: HashSet<AuthenticationFactor> = HashSet::new();

        for reference in &ctx.references {
            if !seen_authenticators.insert(reference.name.clone()) {
                continue;
            }
            if let Some(meta) = self.registry.lookup(&reference.name) {
                engaged_factors.extend(meta.factors);
            }
        }

        AssuranceContext {
            aal: Aal::from_engaged_factor_count(engaged_factors.len()),
            ial: Ial(Level::L1),
            references: ctx.references.clone(),
        }
    }

    /// Append a newly engaged authenticator and recompute AAL/IAL from the
    /// union of references. `AAL_level(update(ctx, a)) >= AAL_level(ctx)`
    /// holds because the engaged-factor set only grows.
    pub fn update(
        &self,
        mut ctx: AssuranceContext,
        authenticator_name: &str,
        step_index: u32,
    ) -> AssuranceContext {
        ctx.references
            .push(castellan_core::assurance::AuthenticatorReference {
                name: authenticator_name.to_string(),
                step_index,
                engaged_at: Utc::now(),
            });
        self.compute(&ctx)
    }

    /// Verify a context meets the requested levels. An empty
    /// required level is "no constraint" on that dimension; both empty is a
    /// caller error, not a vacuous success.
    pub fn verify(
        &self,
        ctx: Option<&AssuranceContext>,
        required_aal: Option<Aal>,
        required_ial: Option<Ial>,
    ) -> Result<(), AssuranceError> {
        let ctx = ctx.ok_or(AssuranceError::NilAssuranceContext)?;

        if required_aal.is_none() && required_ial.is_none() {
            return Err(AssuranceError::NoAssuranceRequirements);
        }

        let aal_ok = required_aal.is_none_or(|required| ctx.aal >= required);
        let ial_ok = required_ial.is_none_or(|required| ctx.ial >= required);

        if aal_ok && ial_ok {
            Ok(())
        } else {
            Err(AssuranceError::InsufficientAssurance)
        }
    }

    /// Registers a authenticator's static metadata with the underlying
    /// registry; a thin pass-through kept here so callers only need to hold
    /// an `AssuranceEngine` during bootstrap.
    pub fn register_authenticator(&self, meta: AuthenticatorMeta) {
        self.registry.register(meta);
    }
}
