//! `classguard-auth` — identity context for the query gateway.
//!
//! Tokens are issued and verified by an external identity provider; this
//! crate only turns verified session claims into a [`Caller`]. It is
//! decoupled from storage: the role lookup is supplied by the caller.

pub mod claims;
pub mod identity;
pub mod principal;

pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use identity::{authenticated_subject, caller_for, resolve_caller};
pub use principal::{Caller, Principal};

pub use classguard_core::{Role, UserId};
