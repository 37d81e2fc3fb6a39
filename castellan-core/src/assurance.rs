//! Data model for the assurance assertion attached to an authenticated user.
//!
//! The arithmetic that derives an [`AssuranceContext`] from a set of engaged
//! authenticators lives in the sibling `castellan-assurance` crate; this
//! module only carries the types, since they are shared by the executor
//! framework, the flow engine, and the OAuth2 layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The ordered assurance domain, shared by the two disjoint tag families
/// below. Comparison is by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Unknown = 0,
    L1 = 1,
    L2 = 2,
    L3 = 3,
}

impl Level {
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Unknown
    }
}

/// Authenticator Assurance Level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aal(pub Level);

/// Identity Assurance Level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ial(pub Level);

impl PartialOrd for Aal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.0.cmp(&other.0))
    }
}

impl PartialOrd for Ial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.0.cmp(&other.0))
    }
}

impl Aal {
    #[must_use]
    pub fn from_engaged_factor_count(count: usize) -> Self {
        Self(match count {
            0 => Level::Unknown,
            1 => Level::L1,
            2 => Level::L2,
            _ => Level::L3,
        })
    }

    #[must_use]
    pub const fn wire(self) -> &'static str {
        match self.0 {
            Level::Unknown => "UNKNOWN",
            Level::L1 => "AAL1",
            Level::L2 => "AAL2",
            Level::L3 => "AAL3",
        }
    }
}

impl Ial {
    #[must_use]
    pub const fn wire(self) -> &'static str {
        match self.0 {
            Level::Unknown => "UNKNOWN",
            Level::L1 => "IAL1",
            Level::L2 => "IAL2",
            Level::L3 => "IAL3",
        }
    }
}

/// The closed set of authentication factors recognised by the assurance
/// engine (NIST 800-63 terminology).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthenticationFactor {
    Knowledge,
    Possession,
    Inherence,
}

/// Static metadata about a registered authenticator, independent of any
/// particular flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorMeta {
    pub name: String,
    pub factors: Vec<AuthenticationFactor>,
    /// The external IdP "type" this authenticator is associated with, if
    /// it is a federated authenticator (e.g. `"google"`, `"github"`).
    pub idp_type: Option<String>,
}

/// A single engagement of an authenticator within one flow. Immutable once
/// created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatorReference {
    pub name: String,
    pub step_index: u32,
    pub engaged_at: DateTime<Utc>,
}

/// The assurance assertion attached to an [`crate::state::AuthenticatedUser`]
/// for the lifetime of a flow. Append-only: new references are pushed, never
/// removed, and AAL/IAL are recomputed from the full reference list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssuranceContext {
    pub aal: Aal,
    pub ial: Ial,
    pub references: Vec<AuthenticatorReference>,
}

impl AssuranceContext {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_compare_by_ordinal() {
        assert!(Level::Unknown < Level::L1);
        assert!(Level::L1 < Level::L2);
        assert!(Level::L2 < Level::L3);
        assert_eq!(Level::L2.ordinal(), 2);
    }

    #[test]
    fn aal_and_ial_share_the_ordinal_domain_but_are_distinct_types() {
        assert!(Aal(Level::L2) > Aal(Level::L1));
        assert!(Ial(Level::L3) > Ial(Level::Unknown));
    }

    #[test]
    fn aal_wire_constants_match_spec() {
        assert_eq!(Aal(Level::Unknown).wire(), "UNKNOWN");
        assert_eq!(Aal(Level::L1).wire(), "AAL1");
        assert_eq!(Aal(Level::L2).wire(), "AAL2");
        assert_eq!(Aal(Level::L3).wire(), "AAL3");
    }

    #[test]
    fn ial_wire_constants_match_spec() {
        assert_eq!(Ial(Level::Unknown).wire(), "UNKNOWN");
        assert_eq!(Ial(Level::L1).wire(), "IAL1");
        assert_eq!(Ial(Level::L2).wire(), "IAL2");
        assert_eq!(Ial(Level::L3).wire(), "IAL3");
    }

    #[test]
    fn aal_from_engaged_factor_count_maps_cardinality() {
        assert_eq!(Aal::from_engaged_factor_count(0), Aal(Level::Unknown));
        assert_eq!(Aal::from_engaged_factor_count(1), Aal(Level::L1));
        assert_eq!(Aal::from_engaged_factor_count(2), Aal(Level::L2));
        assert_eq!(Aal::from_engaged_factor_count(3), Aal(Level::L3));
        assert_eq!(Aal::from_engaged_factor_count(5), Aal(Level::L3));
    }

    #[test]
    fn context_is_empty_until_a_reference_is_appended() {
        let mut ctx = AssuranceContext::default();
        assert!(ctx.is_empty());
        ctx.references.push(AuthenticatorReference {
            name: "credentials".into(),
            step_index: 0,
            engaged_at: Utc::now(),
        });
        assert!(!ctx.is_empty());
    }
}
