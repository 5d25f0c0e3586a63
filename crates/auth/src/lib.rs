//! Opaque session-token verification.
//!
//! The core consumes tokens minted elsewhere; all it needs is
//! `verify(token) -> UserInfo | none`. The production verifier decodes
//! HS256 JWTs with a shared secret, but everything downstream depends
//! only on the [`TokenVerifier`] trait.

mod claims;
mod crypto;

pub use claims::*;
pub use crypto::*;

use serde::Deserialize;
use serde::Serialize;

/// Verified identity extracted from a session token. `sub` is the
/// canonical user id used in session membership maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub picture: Option<String>,
}

/// Anything that can turn an opaque token into a verified identity.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<UserInfo>;
}
