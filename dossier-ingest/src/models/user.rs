//! User roles
//!
//! Session management itself is an upstream concern; this service only
//! needs the caller's role to gate mutating workflow entry points.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Reader,
    Publisher,
    SuperAdmin,
}

impl UserRole {
    /// Whether this role may create, edit, or publish content
    pub fn can_publish(&self) -> bool {
        matches!(self, UserRole::Publisher | UserRole::SuperAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_cannot_publish() {
        assert!(!UserRole::Reader.can_publish());
        assert!(UserRole::Publisher.can_publish());
        assert!(UserRole::SuperAdmin.can_publish());
    }

    #[test]
    fn role_wire_format() {
        assert_eq!(
            serde_json::to_value(UserRole::SuperAdmin).unwrap(),
            "super_admin"
        );
        let role: UserRole = serde_json::from_str("\"publisher\"").unwrap();
        assert_eq!(role, UserRole::Publisher);
    }
}
