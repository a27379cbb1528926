//! Token verification. Authentication itself lives elsewhere; this module
//! only turns a bearer token into an opaque user identity plus display data.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
}

/// Claims carried by access tokens.
#[derive(Debug, Deserialize)]
pub struct Claims {
    /// User id, the engine's opaque identity.
    pub sub: i64,
    pub exp: usize,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: i64,
        exp: usize,
        nickname: Option<String>,
    }

    fn token(secret: &str, sub: i64, exp: usize) -> String {
        encode(
            &Header::default(),
            &TestClaims {
                sub,
                exp,
                nickname: Some("gale".to_string()),
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_verifies() {
        let secret = "0123456789abcdef0123456789abcdef";
        let verifier = TokenVerifier::new(secret);
        let claims = verifier
            .verify(&token(secret, 42, 4_000_000_000))
            .unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.nickname.as_deref(), Some("gale"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = TokenVerifier::new("0123456789abcdef0123456789abcdef");
        let forged = token("another-secret-another-secret-xx", 42, 4_000_000_000);
        assert!(verifier.verify(&forged).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let secret = "0123456789abcdef0123456789abcdef";
        let verifier = TokenVerifier::new(secret);
        assert!(verifier.verify(&token(secret, 42, 1_000)).is_err());
    }
}
