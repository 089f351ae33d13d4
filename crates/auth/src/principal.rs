use serde::{Deserialize, Serialize};

use classguard_core::{Role, UserId};

/// A fully resolved principal for policy decisions. Immutable per request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn student(id: UserId) -> Self {
        Self::new(id, Role::Student)
    }

    pub fn teacher(id: UserId) -> Self {
        Self::new(id, Role::Teacher)
    }

    pub fn admin(id: UserId) -> Self {
        Self::new(id, Role::Admin)
    }
}

impl core::fmt::Display for Principal {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

/// Who is calling: an authenticated principal, or nobody.
///
/// `Anonymous` is a deny-all identity, not an error. It has no role and
/// matches no policy predicate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Caller {
    #[default]
    Anonymous,
    Authenticated(Principal),
}

impl Caller {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Caller::Anonymous => None,
            Caller::Authenticated(p) => Some(p),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.principal().map(|p| p.role)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Caller::Authenticated(_))
    }
}

impl From<Principal> for Caller {
    fn from(value: Principal) -> Self {
        Caller::Authenticated(value)
    }
}

impl From<Option<Principal>> for Caller {
    fn from(value: Option<Principal>) -> Self {
        value.map(Caller::Authenticated).unwrap_or(Caller::Anonymous)
    }
}

impl core::fmt::Display for Caller {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Caller::Anonymous => f.write_str("anonymous"),
            Caller::Authenticated(p) => core::fmt::Display::fmt(p, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_has_no_role() {
        let caller = Caller::default();
        assert!(!caller.is_authenticated());
        assert_eq!(caller.role(), None);
        assert_eq!(caller.to_string(), "anonymous");
    }

    #[test]
    fn optional_principal_converts() {
        let p = Principal::teacher(UserId::new());
        assert_eq!(Caller::from(Some(p)), Caller::Authenticated(p));
        assert_eq!(Caller::from(None), Caller::Anonymous);
    }
}
