use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::user::UserType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

pub fn issue_token(user_id: Uuid, role: UserType, secret: &str, ttl_hours: i64) -> Result<String> {
    let exp = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| Error::Config(format!("Token lifetime of {} hours is out of range", ttl_hours)))?
        .timestamp()
        .max(0) as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
        role: Some(role.as_str().to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Token signing failed: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| Error::Unauthorized("invalid_token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_decodes_with_same_secret() {
        let user_id = Uuid::new_v4();
        let token = issue_token(user_id, UserType::Admin, "secret", 1).unwrap();
        let claims = decode_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role.as_deref(), Some("admin"));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = issue_token(Uuid::new_v4(), UserType::User, "secret", 1).unwrap();
        let err = decode_token(&token, "other").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
    }

    #[test]
    fn out_of_range_lifetime_is_a_config_error() {
        let err = issue_token(Uuid::new_v4(), UserType::User, "secret", i64::MAX).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(Uuid::new_v4(), UserType::User, "secret", -2).unwrap();
        assert!(decode_token(&token, "secret").is_err());
    }
}
