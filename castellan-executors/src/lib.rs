//! # Castellan Executors
//!
//! The executor lifecycle framework plus every concrete
//! authenticator and utility executor the flow engine drives: credentials,
//! SMS/email OTP, federated OIDC/OAuth, passkey, the authorization
//! permission check, OU creation, and the registration-graph provisioning
//! node. Each concrete authenticator and its external collaborator ports
//! (user lookup, notification channel, OAuth provider, WebAuthn ceremony,
//! authorization decision, OU service, user provisioning) are generic, so
//! the concrete storage/transport backing them stays outside this crate.

#![allow(missing_docs)]

pub mod context;
pub mod executor;
pub mod registry;

pub mod authorization;
pub mod credentials;
pub mod federated;
pub mod otp;
pub mod ou_creation;
pub mod passkey;
pub mod provisioning;

pub use context::NodeContext;
pub use executor::{ExecStatus, Executor, ExecutorKind, ExecutorResponse, RequiredInput, ResponseType};
pub use provisioning::PROVISIONING_EXECUTOR_NAME;
pub use registry::ExecutorRegistry;
