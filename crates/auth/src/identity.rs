//! Identity context: verified session claims → [`Caller`].
//!
//! Every failure mode (no session, expired session, unknown user) collapses
//! to [`Caller::Anonymous`]. Identity absence is a deny-all identity, never
//! an error surfaced to the caller.

use chrono::{DateTime, Utc};

use classguard_core::{Role, UserId};

use crate::claims::{SessionClaims, validate_claims};
use crate::principal::{Caller, Principal};

/// Subject of a session that is currently valid, if any.
pub fn authenticated_subject(claims: Option<&SessionClaims>, now: DateTime<Utc>) -> Option<UserId> {
    let claims = claims?;
    match validate_claims(claims, now) {
        Ok(()) => Some(claims.sub),
        Err(e) => {
            tracing::debug!(sub = %claims.sub, error = %e, "session rejected; treating caller as anonymous");
            None
        }
    }
}

/// Build the caller for a subject whose role has been looked up.
///
/// A subject without a `users` row has no role and stays anonymous.
pub fn caller_for(subject: Option<UserId>, role: Option<Role>) -> Caller {
    match (subject, role) {
        (Some(id), Some(role)) => Caller::Authenticated(Principal::new(id, role)),
        (Some(id), None) => {
            tracing::debug!(sub = %id, "no user row for session subject; treating caller as anonymous");
            Caller::Anonymous
        }
        (None, _) => Caller::Anonymous,
    }
}

/// Resolve a caller synchronously with a role lookup function.
pub fn resolve_caller<F>(claims: Option<&SessionClaims>, now: DateTime<Utc>, lookup_role: F) -> Caller
where
    F: FnOnce(UserId) -> Option<Role>,
{
    let subject = authenticated_subject(claims, now);
    let role = subject.and_then(lookup_role);
    caller_for(subject, role)
}
