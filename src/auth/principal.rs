//! Principals, roles and the authorities they grant.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    AdminRead,
    AdminUpdate,
    AdminCreate,
    AdminDelete,
    UserRead,
    UserUpdate,
    UserCreate,
    UserDelete,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::AdminRead => "admin:read",
            Permission::AdminUpdate => "admin:update",
            Permission::AdminCreate => "admin:create",
            Permission::AdminDelete => "admin:delete",
            Permission::UserRead => "user:read",
            Permission::UserUpdate => "user:update",
            Permission::UserCreate => "user:create",
            Permission::UserDelete => "user:delete",
        }
    }
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::User => &[],
            Role::Admin => &[
                Permission::AdminRead,
                Permission::AdminUpdate,
                Permission::AdminCreate,
                Permission::AdminDelete,
                Permission::UserRead,
                Permission::UserUpdate,
                Permission::UserCreate,
                Permission::UserDelete,
            ],
        }
    }
}

/// An account known to the user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    /// Login identity (email). Unique across the directory.
    pub identity: String,
    pub first_name: String,
    pub last_name: String,
    pub credential_hash: String,
    pub role: Role,
}

impl Principal {
    pub fn new(
        identity: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        credential_hash: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity: identity.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            credential_hash: credential_hash.into(),
            role,
        }
    }

    /// Role permissions as `resource:action`, plus `ROLE_<NAME>`.
    pub fn authorities(&self) -> Vec<String> {
        self.role
            .permissions()
            .iter()
            .map(|p| p.as_str().to_string())
            .chain(std::iter::once(format!("ROLE_{}", self.role.name())))
            .collect()
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        authority == format!("ROLE_{}", self.role.name())
            || self.role.permissions().iter().any(|p| p.as_str() == authority)
    }
}

/// What callers may see about a principal. Never includes the hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalView {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub authorities: Vec<String>,
}

impl From<&Principal> for PrincipalView {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            email: p.identity.clone(),
            first_name: p.first_name.clone(),
            last_name: p.last_name.clone(),
            role: p.role,
            authorities: p.authorities(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_has_only_role_authority() {
        let p = Principal::new("a@example.com", "A", "B", "hash", Role::User);
        assert_eq!(p.authorities(), vec!["ROLE_USER".to_string()]);
        assert!(p.has_authority("ROLE_USER"));
        assert!(!p.has_authority("admin:read"));
    }

    #[test]
    fn test_admin_authorities() {
        let p = Principal::new("root@example.com", "R", "O", "hash", Role::Admin);
        let authorities = p.authorities();
        assert_eq!(authorities.len(), 9);
        assert!(authorities.contains(&"user:delete".to_string()));
        assert!(p.has_authority("admin:read"));
        assert!(p.has_authority("ROLE_ADMIN"));
        assert!(!p.has_authority("ROLE_USER"));
    }

    #[test]
    fn test_view_hides_hash() {
        let p = Principal::new("a@example.com", "A", "B", "secret-hash", Role::User);
        let json = serde_json::to_string(&PrincipalView::from(&p)).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"USER\""));
    }
}
