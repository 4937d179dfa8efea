//! User types and roles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// User role. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Superadmin,
    Admin,
    Manager,
    Salesperson,
    Marketing,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Superadmin => "superadmin",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Salesperson => "salesperson",
            Role::Marketing => "marketing",
        }
    }

    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "superadmin" => Some(Role::Superadmin),
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "salesperson" => Some(Role::Salesperson),
            "marketing" => Some(Role::Marketing),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    /// None only for the platform superadmin
    pub company_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub city: Option<String>,
    pub role: Role,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User without sensitive data (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub mobile: Option<String>,
    pub city: Option<String>,
    pub role: Role,
    pub is_active: bool,
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            company_id: user.company_id,
            name: user.name,
            email: user.email,
            mobile: user.mobile,
            city: user.city,
            role: user.role,
            is_active: user.is_active,
        }
    }
}

/// Request to create a company admin (superadmin only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminRequest {
    pub company_id: Uuid,
    pub name: String,
    pub email: String,
    pub password: String,
    pub mobile: Option<String>,
    pub city: Option<String>,
}

/// Request to create a salesperson in the caller's company
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSalespersonRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub mobile: Option<String>,
    pub city: Option<String>,
}

/// Stored refresh token. Only the SHA-256 digest of the raw token is
/// persisted; the raw value exists client-side only.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

/// Login / refresh reply: access token pair plus the user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: UserPublic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::Superadmin,
            Role::Admin,
            Role::Manager,
            Role::Salesperson,
            Role::Marketing,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse("Admin"), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Salesperson).unwrap(),
            "\"salesperson\""
        );
    }
}
