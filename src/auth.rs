//! Authentication utilities: JWT token management, password hashing,
//! refresh token generation

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::types::{Request, Role};

/// Access token lifetime: one day
const ACCESS_TOKEN_TTL_SECS: usize = 24 * 60 * 60;

/// Refresh token lifetime
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// User email
    pub email: String,
    /// User role
    pub role: Role,
    /// Tenant (None only for the platform superadmin)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
}

impl AuthInfo {
    /// The caller's tenant. Errors for the superadmin, who has none and
    /// must not reach company-scoped data paths.
    pub fn require_company(&self) -> Result<Uuid> {
        self.company_id
            .ok_or_else(|| anyhow!("Operation requires a company-scoped account"))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_superadmin(&self) -> bool {
        self.role == Role::Superadmin
    }

    /// Campaign management is open to admins and managers
    pub fn can_manage_campaigns(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
    }
}

/// Generate a JWT access token
pub fn generate_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    company_id: Option<Uuid>,
    secret: &str,
) -> Result<String> {
    let now = chrono::Utc::now().timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        company_id: company_id.map(|id| id.to_string()),
        iat: now,
        exp: now + ACCESS_TOKEN_TTL_SECS,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow!("Invalid password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate an opaque refresh token: 40 random bytes, hex-encoded.
/// Returns the raw token (sent to the client) and its digest (stored).
pub fn generate_refresh_token() -> (String, String) {
    let mut bytes = [0u8; 40];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let digest = refresh_token_digest(&token);
    (token, digest)
}

/// Digest under which a refresh token is stored. The raw token never
/// touches the database.
pub fn refresh_token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extract authentication info from a NATS request.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    if let Some(ref token) = request.token {
        let claims = validate_token(token, jwt_secret)?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;
        let company_id = claims
            .company_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| anyhow!("Invalid company_id in token: {}", e))?;
        return Ok(AuthInfo {
            user_id,
            role: claims.role,
            company_id,
        });
    }

    Err(anyhow!("No authentication provided — JWT token is required"))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Request;
    use chrono::Utc;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    // ---- Password hashing tests ----

    #[test]
    fn test_hash_password_produces_valid_hash() {
        let hash = hash_password("my-secure-password").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hash.len() > 50);
    }

    #[test]
    fn test_hash_password_different_each_time() {
        let hash1 = hash_password("same-password").unwrap();
        let hash2 = hash_password("same-password").unwrap();
        assert_ne!(hash1, hash2, "Hashes should differ due to random salt");
    }

    #[test]
    fn test_verify_password_correct() {
        let hash = hash_password("correct-password").unwrap();
        assert!(verify_password("correct-password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_incorrect() {
        let hash = hash_password("correct-password").unwrap();
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        let result = verify_password("any-password", "not-a-valid-hash");
        assert!(result.is_err());
    }

    // ---- JWT token tests ----

    #[test]
    fn test_generate_and_validate_token() {
        let user_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();
        let token = generate_token(
            user_id,
            "admin@example.com",
            Role::Admin,
            Some(company_id),
            TEST_SECRET,
        )
        .unwrap();

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "admin@example.com");
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.company_id.unwrap(), company_id.to_string());
    }

    #[test]
    fn test_superadmin_token_has_no_company() {
        let user_id = Uuid::new_v4();
        let token = generate_token(
            user_id,
            "root@example.com",
            Role::Superadmin,
            None,
            TEST_SECRET,
        )
        .unwrap();

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert!(claims.company_id.is_none());
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let user_id = Uuid::new_v4();
        let token =
            generate_token(user_id, "a@b.com", Role::Admin, None, TEST_SECRET).unwrap();

        let result = validate_token(&token, "wrong-secret-also-32-bytes-long!!");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_token_malformed() {
        let result = validate_token("not.a.valid.token", TEST_SECRET);
        assert!(result.is_err());
    }

    #[test]
    fn test_token_preserves_role() {
        let user_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();

        for role in [Role::Admin, Role::Manager, Role::Salesperson, Role::Marketing] {
            let token =
                generate_token(user_id, "u@example.com", role, Some(company_id), TEST_SECRET)
                    .unwrap();
            let claims = validate_token(&token, TEST_SECRET).unwrap();
            assert_eq!(claims.role, role);
        }
    }

    // ---- Refresh token tests ----

    #[test]
    fn test_refresh_token_is_80_hex_chars() {
        let (token, _) = generate_refresh_token();
        assert_eq!(token.len(), 80);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let (a, _) = generate_refresh_token();
        let (b, _) = generate_refresh_token();
        assert_ne!(a, b);
    }

    #[test]
    fn test_refresh_token_digest_is_stable() {
        let (token, digest) = generate_refresh_token();
        assert_eq!(refresh_token_digest(&token), digest);
        assert_ne!(token, digest);
    }

    // ---- extract_auth tests ----

    fn make_request_with_token<T: Default>(token: Option<String>) -> Request<T> {
        Request {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            token,
            payload: T::default(),
        }
    }

    #[test]
    fn test_extract_auth_with_valid_token() {
        let user_id = Uuid::new_v4();
        let company_id = Uuid::new_v4();
        let token = generate_token(
            user_id,
            "admin@example.com",
            Role::Admin,
            Some(company_id),
            TEST_SECRET,
        )
        .unwrap();

        let request = make_request_with_token::<serde_json::Value>(Some(token));
        let auth = extract_auth(&request, TEST_SECRET).unwrap();

        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.role, Role::Admin);
        assert_eq!(auth.company_id, Some(company_id));
        assert_eq!(auth.require_company().unwrap(), company_id);
    }

    #[test]
    fn test_extract_auth_superadmin_has_no_company() {
        let user_id = Uuid::new_v4();
        let token =
            generate_token(user_id, "root@example.com", Role::Superadmin, None, TEST_SECRET)
                .unwrap();

        let request = make_request_with_token::<serde_json::Value>(Some(token));
        let auth = extract_auth(&request, TEST_SECRET).unwrap();

        assert!(auth.is_superadmin());
        assert!(auth.require_company().is_err());
    }

    #[test]
    fn test_extract_auth_no_token_fails() {
        let request = make_request_with_token::<serde_json::Value>(None);
        let result = extract_auth(&request, TEST_SECRET);
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_auth_invalid_token_fails() {
        let request = make_request_with_token::<serde_json::Value>(Some("bad-token".to_string()));
        let result = extract_auth(&request, TEST_SECRET);
        assert!(result.is_err());
    }

    #[test]
    fn test_role_gates() {
        let admin = AuthInfo {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
            company_id: Some(Uuid::new_v4()),
        };
        assert!(admin.is_admin());
        assert!(admin.can_manage_campaigns());

        let manager = AuthInfo {
            user_id: Uuid::new_v4(),
            role: Role::Manager,
            company_id: Some(Uuid::new_v4()),
        };
        assert!(!manager.is_admin());
        assert!(manager.can_manage_campaigns());

        let salesperson = AuthInfo {
            user_id: Uuid::new_v4(),
            role: Role::Salesperson,
            company_id: Some(Uuid::new_v4()),
        };
        assert!(!salesperson.can_manage_campaigns());
    }
}
