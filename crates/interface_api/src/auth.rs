//! Authentication
//!
//! Bearer tokens are HS256 JWTs whose subject is the caller's actor id and
//! whose `roles` claim lists platform roles. A verified token becomes the
//! [`ActorContext`] handed to the settlement engine; authorization itself
//! happens inside the engine.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use core_kernel::ActorId;
use domain_settlement::{ActorContext, Role};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (actor UUID)
    pub sub: String,
    /// Actor's roles
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

/// Auth errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid subject: {0}")]
    InvalidSubject(String),
}

impl Claims {
    /// Converts verified claims into the engine's caller identity
    ///
    /// Roles the settlement engine does not know are dropped; a caller left
    /// with no roles is refused by every operation that needs one.
    pub fn actor_context(&self) -> Result<ActorContext, AuthError> {
        let uuid = Uuid::parse_str(&self.sub)
            .map_err(|_| AuthError::InvalidSubject(self.sub.clone()))?;

        let roles = self
            .roles
            .iter()
            .filter_map(|r| match r.parse::<Role>() {
                Ok(role) => Some(role),
                Err(_) => {
                    debug!(role = %r, "Ignoring role outside settlement");
                    None
                }
            })
            .collect();

        Ok(ActorContext::new(ActorId::from_uuid(uuid), roles))
    }
}

/// Creates a new JWT token for an actor
///
/// # Arguments
///
/// * `actor` - Identity and roles to embed
/// * `secret` - JWT secret key
/// * `expiration_secs` - Token validity in seconds
pub fn create_token(
    actor: &ActorContext,
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: actor.actor_id.as_uuid().to_string(),
        roles: actor.roles.iter().map(|r| r.as_str().to_string()).collect(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// # Arguments
///
/// * `token` - The JWT token to validate
/// * `secret` - JWT secret key
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_carries_actor_context() {
        let actor = ActorContext::new(ActorId::new(), vec![Role::Manager, Role::Accountant]);
        let token = create_token(&actor, SECRET, 60).unwrap();

        let claims = validate_token(&token, SECRET).unwrap();
        assert_eq!(claims.actor_context().unwrap(), actor);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let actor = ActorContext::with_role(ActorId::new(), Role::Agent);
        let token = create_token(&actor, SECRET, 60).unwrap();

        assert!(matches!(
            validate_token(&token, "other-secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let now = Utc::now();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            roles: vec!["agent".to_string()],
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(validate_token(&token, SECRET), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_unknown_roles_are_dropped() {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            roles: vec!["agent".to_string(), "support".to_string()],
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.actor_context().unwrap().roles, vec![Role::Agent]);
    }

    #[test]
    fn test_non_uuid_subject_is_rejected() {
        let claims = Claims {
            sub: "alice".to_string(),
            roles: vec![],
            exp: 0,
            iat: 0,
        };
        assert!(matches!(claims.actor_context(), Err(AuthError::InvalidSubject(_))));
    }
}
