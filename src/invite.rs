//! Invite token generation and validation.
//!
//! Granting portal access issues a signed claim link instead of sending a
//! password reset email. The token is an HS256 JWT carrying the target user
//! id; claiming it sets the account's first password.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Invite token duration: 48 hours.
pub const INVITE_DURATION_SECS: u64 = 48 * 60 * 60;

/// Token type marker, so an invite cannot be confused with anything else
/// signed by the same secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Invite,
}

/// JWT claims for invite tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteClaims {
    /// JWT ID (unique per issued invite)
    pub jti: String,
    /// Target user id
    pub sub: i64,
    /// Login the invite was issued for
    pub login: String,
    /// Token type
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Result of generating an invite token.
#[derive(Debug, Clone)]
pub struct InviteTokenResult {
    /// The JWT token string
    pub token: String,
    /// JWT ID
    pub jti: String,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
}

#[derive(Debug)]
pub enum InviteError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Error decoding the token
    Decoding(jsonwebtoken::errors::Error),
    /// System time error
    TimeError,
}

impl std::fmt::Display for InviteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InviteError::Encoding(e) => write!(f, "Failed to encode invite token: {}", e),
            InviteError::Decoding(e) => write!(f, "Failed to decode invite token: {}", e),
            InviteError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for InviteError {}

/// Configuration for invite token operations.
#[derive(Clone)]
pub struct InviteConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl InviteConfig {
    /// Create a new invite configuration with the given secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Generate an invite token for a user.
    pub fn generate(&self, user_id: i64, login: &str) -> Result<InviteTokenResult, InviteError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| InviteError::TimeError)?
            .as_secs();

        let jti = uuid::Uuid::new_v4().to_string();
        let exp = now + INVITE_DURATION_SECS;

        let claims = InviteClaims {
            jti: jti.clone(),
            sub: user_id,
            login: login.to_string(),
            token_type: TokenType::Invite,
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(InviteError::Encoding)?;

        Ok(InviteTokenResult {
            token,
            jti,
            expires_at: exp,
        })
    }

    /// Validate an invite token and return its claims.
    /// Rejects expired tokens and tokens signed with a different secret.
    pub fn validate(&self, token: &str) -> Result<InviteClaims, InviteError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<InviteClaims>(token, &self.decoding_key, &validation)
            .map_err(InviteError::Decoding)?;
        Ok(data.claims)
    }

    /// Build the claim URL for an issued token.
    pub fn claim_url(&self, origin: &str, token: &str) -> String {
        format!("{}/claim?token={}", origin.trim_end_matches('/'), token)
    }
}
