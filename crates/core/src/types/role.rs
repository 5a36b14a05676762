//! Identity roles.

use serde::{Deserialize, Serialize};

/// Role attached to an authenticated identity.
///
/// Administrative capabilities form a strict hierarchy
/// (`Admin` ⊇ `Staff` ⊇ `Customer`); ownership of customer resources is
/// checked separately and does not follow role rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Ordering customer.
    Customer,
    /// Cafe staff fulfilling orders.
    Staff,
    /// Administrator managing the menu, coupons, and staff.
    Admin,
}

impl Role {
    /// Whether this role sits at or above `other` in the administrative
    /// hierarchy.
    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Customer => 0,
            Self::Staff => 1,
            Self::Admin => 2,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Staff => write!(f, "staff"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hierarchy() {
        assert!(Role::Admin.at_least(Role::Staff));
        assert!(Role::Staff.at_least(Role::Customer));
        assert!(!Role::Customer.at_least(Role::Staff));
        assert!(Role::Staff.at_least(Role::Staff));
    }

    #[test]
    fn test_display_from_str_roundtrip() {
        for role in [Role::Customer, Role::Staff, Role::Admin] {
            let parsed: Role = role.to_string().parse().expect("parse role");
            assert_eq!(parsed, role);
        }
        assert!("barista".parse::<Role>().is_err());
    }
}
