//! `storefront-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: it knows how
//! roles relate to each other, what a token carries and how credentials are
//! hashed, but never where users live.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod principal;
pub mod roles;

pub use authorize::{AccessDenied, AuthorizationExplanation, authorize, explain_authorization, is_permitted};
pub use claims::{JwtClaims, TokenError, validate_claims};
pub use jwt::{Authenticator, Hs256Authenticator};
pub use password::{BcryptHasher, CredentialError, CredentialHasher};
pub use principal::Principal;
pub use roles::{Role, UnknownRole};
