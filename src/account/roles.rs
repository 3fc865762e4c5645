//! Access control: single owner plus per-address capability roles
//!
//! Checks fail closed. Holding no entry in the role map means holding no
//! capability, and ownership alone never implies the Executor capability.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::Address;

/// Capability a party can hold on an account
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Admin,
    Executor,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Executor => write!(f, "executor"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "executor" => Ok(Role::Executor),
            _ => Err(format!("Invalid role: {}. Allowed: admin, executor", s)),
        }
    }
}

/// Explicit capability set for one address.
///
/// Named booleans instead of a bitmask so "the owner holds no Executor by
/// default" is visible in state dumps and directly testable.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoleSet {
    pub admin: bool,
    pub executor: bool,
}

impl RoleSet {
    pub const EMPTY: RoleSet = RoleSet {
        admin: false,
        executor: false,
    };

    pub fn single(role: Role) -> Self {
        let mut set = RoleSet::EMPTY;
        set.insert(role);
        set
    }

    pub fn has(&self, role: Role) -> bool {
        match role {
            Role::Admin => self.admin,
            Role::Executor => self.executor,
        }
    }

    pub fn insert(&mut self, role: Role) {
        match role {
            Role::Admin => self.admin = true,
            Role::Executor => self.executor = true,
        }
    }

    /// Add every capability present in `other`
    pub fn grant(&mut self, other: RoleSet) {
        self.admin |= other.admin;
        self.executor |= other.executor;
    }

    /// Remove every capability present in `other`
    pub fn revoke(&mut self, other: RoleSet) {
        if other.admin {
            self.admin = false;
        }
        if other.executor {
            self.executor = false;
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.admin && !self.executor
    }
}

/// Entry-point gating failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    #[error("caller {caller} does not hold the {role} role")]
    MissingRole { caller: Address, role: Role },
    #[error("caller {caller} is not the account owner")]
    NotOwner { caller: Address },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_set_grant_revoke() {
        let mut set = RoleSet::single(Role::Executor);
        assert!(set.has(Role::Executor));
        assert!(!set.has(Role::Admin));

        set.grant(RoleSet::single(Role::Admin));
        assert!(set.has(Role::Admin));

        set.revoke(RoleSet::single(Role::Executor));
        assert!(!set.has(Role::Executor));
        assert!(set.has(Role::Admin));
        assert!(!set.is_empty());
    }

    #[test]
    fn test_empty_set_holds_nothing() {
        assert!(!RoleSet::EMPTY.has(Role::Admin));
        assert!(!RoleSet::EMPTY.has(Role::Executor));
        assert!(RoleSet::EMPTY.is_empty());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Executor".parse::<Role>().unwrap(), Role::Executor);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("owner".parse::<Role>().is_err());
    }
}
