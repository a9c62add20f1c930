//! JWT token generation and validation
//!
//! Tokens are HS256-signed and carry the principal's id, email, role, and
//! (for admins) department, so request handlers and the WebSocket handshake
//! can authorize without a user lookup on every call.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::schemas::UserRole;
use crate::types::AppError;

/// Claims embedded in every token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Principal id (ObjectId hex)
    pub sub: String,
    /// Login email
    pub email: String,
    /// Principal role
    pub role: UserRole,
    /// Department for admin principals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Matches the user's stored token_version; bump the stored value to
    /// invalidate outstanding tokens
    #[serde(default)]
    pub token_version: i32,
    /// Expiry (unix seconds)
    pub exp: u64,
    /// Issued at (unix seconds)
    pub iat: u64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Input for issuing a token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
    pub department: Option<String>,
    pub token_version: i32,
}

/// Result of verifying a token
#[derive(Debug)]
pub struct TokenValidationResult {
    pub valid: bool,
    pub claims: Option<Claims>,
    pub error: Option<String>,
}

/// Issues and validates JWT tokens
#[derive(Clone)]
pub struct JwtValidator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    /// Create a validator with the given secret
    pub fn new(secret: String, expiry_seconds: u64) -> Result<Self, AppError> {
        if secret.is_empty() {
            return Err(AppError::AuthenticationRequired(
                "JWT secret must not be empty".into(),
            ));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        })
    }

    /// Dev-mode validator with a fixed insecure secret
    pub fn new_dev() -> Self {
        let secret = "dev-only-insecure-secret";
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds: 86400,
        }
    }

    /// Issue a token; returns (token, expiry unix seconds)
    pub fn issue_token(&self, input: TokenInput) -> Result<(String, u64), AppError> {
        let now = unix_now();
        let claims = Claims {
            sub: input.user_id,
            email: input.email,
            role: input.role,
            department: input.department,
            token_version: input.token_version,
            exp: now + self.expiry_seconds,
            iat: now,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::AuthenticationRequired(format!("Failed to sign token: {e}")))?;

        Ok((token, claims.exp))
    }

    /// Verify a token's signature and expiry
    pub fn verify_token(&self, token: &str) -> TokenValidationResult {
        match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(data) => TokenValidationResult {
                valid: true,
                claims: Some(data.claims),
                error: None,
            },
            Err(e) => TokenValidationResult {
                valid: false,
                claims: None,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix("Bearer ").map(str::trim)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> TokenInput {
        TokenInput {
            user_id: "64f000000000000000000001".into(),
            email: "ada@example.org".into(),
            role: UserRole::Admin,
            department: Some("Consumer Affairs".into()),
            token_version: 1,
        }
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let jwt = JwtValidator::new("test-secret".into(), 3600).unwrap();
        let (token, exp) = jwt.issue_token(input()).unwrap();
        assert!(exp > unix_now());

        let result = jwt.verify_token(&token);
        assert!(result.valid);
        let claims = result.claims.unwrap();
        assert_eq!(claims.sub, "64f000000000000000000001");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.department.as_deref(), Some("Consumer Affairs"));
        assert!(claims.is_admin());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let jwt = JwtValidator::new("secret-a".into(), 3600).unwrap();
        let other = JwtValidator::new("secret-b".into(), 3600).unwrap();

        let (token, _) = jwt.issue_token(input()).unwrap();
        let result = other.verify_token(&token);
        assert!(!result.valid);
        assert!(result.claims.is_none());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let jwt = JwtValidator::new_dev();
        assert!(!jwt.verify_token("not.a.token").valid);
        assert!(!jwt.verify_token("").valid);
    }

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(extract_token_from_header(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_token_from_header(Some("bearer abc")), None);
        assert_eq!(extract_token_from_header(Some("abc")), None);
        assert_eq!(extract_token_from_header(None), None);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(JwtValidator::new(String::new(), 3600).is_err());
    }
}
