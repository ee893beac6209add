//! # tb-auth-jwt
//!
//! HS256 JWT implementation of `TokenService` and Argon2 implementation of
//! `CredentialHasher`.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tb_core::error::{AppError, Result};
use tb_core::traits::{CredentialHasher, IssuedToken, TokenService};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
}

pub struct JwtTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtTokenService {
    /// `secret` signs and verifies every token; `ttl` bounds each token's life.
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    /// Issues a token as if the clock read `now`.
    pub fn issue_at(&self, account_id: Uuid, now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: account_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("token encoding failed: {e}")))?;
        Ok(IssuedToken { token, expires_at })
    }
}

impl TokenService for JwtTokenService {
    fn issue(&self, account_id: Uuid) -> Result<IssuedToken> {
        self.issue_at(account_id, Utc::now())
    }

    fn verify(&self, token: &str) -> Result<Uuid> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Expired,
                _ => AppError::InvalidToken,
            })?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::InvalidToken)
    }
}

/// Argon2id PHC string with the default parameters and an all-zero digest.
const DECOY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Argon2id with the crate's default parameters. Hashing runs on the blocking
/// pool so request workers are not stalled.
#[derive(Default)]
pub struct Argon2Hasher;

impl Argon2Hasher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialHasher for Argon2Hasher {
    async fn hash_secret(&self, secret: &str) -> Result<String> {
        let secret = secret.to_owned();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default()
                .hash_password(secret.as_bytes(), &salt)
                .map(|hash| hash.to_string())
        })
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("hashing failed: {e}")))
    }

    /// Verifies if a provided secret matches a stored Argon2 hash.
    async fn verify_secret(&self, secret: &str, hash: &str) -> bool {
        let secret = secret.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || {
            let parsed_hash = match PasswordHash::new(&hash) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "stored credential hash is malformed");
                    return false;
                }
            };
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed_hash)
                .is_ok()
        })
        .await
        .unwrap_or(false)
    }

    fn decoy_hash(&self) -> &'static str {
        DECOY_HASH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtTokenService {
        JwtTokenService::new(b"test-secret", Duration::hours(24))
    }

    #[test]
    fn issued_token_verifies_to_the_same_account() {
        let svc = service();
        let id = Uuid::now_v7();
        let issued = svc.issue(id).unwrap();
        assert_eq!(issued.token.split('.').count(), 3);
        assert_eq!(svc.verify(&issued.token).unwrap(), id);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let svc = service();
        let issued = svc
            .issue_at(Uuid::now_v7(), Utc::now() - Duration::hours(48))
            .unwrap();
        assert!(matches!(svc.verify(&issued.token), Err(AppError::Expired)));
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let other = JwtTokenService::new(b"someone-else", Duration::hours(24));
        let issued = other.issue(Uuid::now_v7()).unwrap();
        assert!(matches!(service().verify(&issued.token), Err(AppError::InvalidToken)));
    }

    #[test]
    fn garbage_is_invalid() {
        assert!(matches!(service().verify("not.a.jwt"), Err(AppError::InvalidToken)));
        assert!(matches!(service().verify(""), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn argon2_round_trip() {
        let hasher = Argon2Hasher::new();
        let hash = hasher.hash_secret("Correct1Horse").await.unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(hasher.verify_secret("Correct1Horse", &hash).await);
        assert!(!hasher.verify_secret("Wrong1Horse", &hash).await);
        assert!(!hasher.verify_secret("Correct1Horse", "not-a-hash").await);
    }

    #[tokio::test]
    async fn decoy_hash_parses_with_real_parameters_and_matches_nothing() {
        let hasher = Argon2Hasher::new();
        let decoy = PasswordHash::new(hasher.decoy_hash()).unwrap();
        assert_eq!(decoy.algorithm.as_str(), "argon2id");

        let real = hasher.hash_secret("Correct1Horse").await.unwrap();
        let real = PasswordHash::new(&real).unwrap();
        assert_eq!(decoy.params, real.params);

        assert!(!hasher.verify_secret("Correct1Horse", hasher.decoy_hash()).await);
        assert!(!hasher.verify_secret("", hasher.decoy_hash()).await);
    }
}
