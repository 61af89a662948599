use chrono::Utc;
use entity::user::{self, Role};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

/// Which signing material a token was minted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id. Older tokens may carry only `email`; identity resolution
    /// falls back to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    pub iss: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    pub typ: TokenKind,
}

/// Result of exchanging a refresh token.
#[derive(Debug, Clone)]
pub struct Refreshed {
    pub access_token: String,
    pub refresh_claims: Claims,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Stateless token service. Access and refresh tokens are signed with
/// separate secrets so one can never be presented as the other.
#[derive(Clone)]
pub struct JwtManager {
    access: std::sync::Arc<KeyPair>,
    refresh: std::sync::Arc<KeyPair>,
    issuer: String,
    access_token_expiry_secs: i64,
    refresh_token_expiry_secs: i64,
}

impl JwtManager {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        if config.jwt_access_secret.is_empty() || config.jwt_refresh_secret.is_empty() {
            return Err(AppError::Internal("JWT secrets must not be empty".to_string()));
        }
        if config.jwt_access_secret == config.jwt_refresh_secret {
            return Err(AppError::Internal(
                "Access and refresh secrets must differ".to_string(),
            ));
        }

        Ok(Self {
            access: std::sync::Arc::new(KeyPair::from_secret(&config.jwt_access_secret)),
            refresh: std::sync::Arc::new(KeyPair::from_secret(&config.jwt_refresh_secret)),
            issuer: config.jwt_issuer.clone(),
            access_token_expiry_secs: config.jwt_access_token_expiry_secs,
            refresh_token_expiry_secs: config.jwt_refresh_token_expiry_days * 24 * 3600,
        })
    }

    pub fn access_token_expiry_secs(&self) -> i64 {
        self.access_token_expiry_secs
    }

    pub fn issue_access_token(&self, user: &user::Model) -> Result<String, AppError> {
        self.issue(
            Some(user.id.clone()),
            Some(user.email.clone()),
            &user.name,
            user.role,
            TokenKind::Access,
        )
    }

    pub fn issue_refresh_token(&self, user: &user::Model) -> Result<String, AppError> {
        self.issue(
            Some(user.id.clone()),
            Some(user.email.clone()),
            &user.name,
            user.role,
            TokenKind::Refresh,
        )
    }

    fn issue(
        &self,
        sub: Option<String>,
        email: Option<String>,
        name: &str,
        role: Role,
        kind: TokenKind,
    ) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let ttl = match kind {
            TokenKind::Access => self.access_token_expiry_secs,
            TokenKind::Refresh => self.refresh_token_expiry_secs,
        };
        let claims = Claims {
            sub,
            email,
            name: name.to_string(),
            role,
            iss: self.issuer.clone(),
            exp: now + ttl,
            iat: now,
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys(kind).encoding)
            .map_err(AppError::Jwt)
    }

    /// Verifies signature, issuer, expiry and token kind. Every failure
    /// collapses into `InvalidToken`.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {e}");
                AppError::InvalidToken
            })?
            .claims;

        if claims.typ != kind {
            return Err(AppError::InvalidToken);
        }
        Ok(claims)
    }

    /// Exchanges a refresh token for a new access token carrying the same
    /// subject, email, role and name.
    pub fn refresh(&self, refresh_token: &str) -> Result<Refreshed, AppError> {
        let refresh_claims = self
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|_| AppError::InvalidRefreshToken)?;

        let access_token = self.issue(
            refresh_claims.sub.clone(),
            refresh_claims.email.clone(),
            &refresh_claims.name,
            refresh_claims.role,
            TokenKind::Access,
        )?;

        Ok(Refreshed {
            access_token,
            refresh_claims,
        })
    }

    fn keys(&self, kind: TokenKind) -> &KeyPair {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            jwt_access_secret: "access-secret".to_string(),
            jwt_refresh_secret: "refresh-secret".to_string(),
            jwt_issuer: "elearning-test".to_string(),
            jwt_access_token_expiry_secs: 3600,
            jwt_refresh_token_expiry_days: 7,
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            cors_allowed_origins: "*".to_string(),
            request_timeout_secs: 30,
            log_format: "text".to_string(),
        }
    }

    fn user(role: Role) -> user::Model {
        let now = Utc::now().naive_utc();
        user::Model {
            id: "u-1".to_string(),
            email: "a@b.com".to_string(),
            password_hash: String::new(),
            name: "A".to_string(),
            role,
            age: None,
            place: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn access_token_round_trips_identity() {
        let jwt = JwtManager::new(&config()).unwrap();
        let token = jwt.issue_access_token(&user(Role::Teacher)).unwrap();
        let claims = jwt.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("u-1"));
        assert_eq!(claims.email.as_deref(), Some("a@b.com"));
        assert_eq!(claims.role, Role::Teacher);
        assert_eq!(claims.typ, TokenKind::Access);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let jwt = JwtManager::new(&config()).unwrap();
        let access = jwt.issue_access_token(&user(Role::User)).unwrap();
        let refresh = jwt.issue_refresh_token(&user(Role::User)).unwrap();
        assert!(jwt.verify(&access, TokenKind::Refresh).is_err());
        assert!(jwt.verify(&refresh, TokenKind::Access).is_err());
        assert!(matches!(
            jwt.refresh(&access),
            Err(AppError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn refresh_preserves_subject_and_role() {
        let jwt = JwtManager::new(&config()).unwrap();
        let refresh = jwt.issue_refresh_token(&user(Role::Admin)).unwrap();
        let refreshed = jwt.refresh(&refresh).unwrap();
        let claims = jwt.verify(&refreshed.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("u-1"));
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.name, "A");
        assert_ne!(claims.jti, refreshed.refresh_claims.jti);
    }

    #[test]
    fn expired_and_malformed_tokens_fail_alike() {
        let mut cfg = config();
        cfg.jwt_access_token_expiry_secs = -3600;
        let jwt = JwtManager::new(&cfg).unwrap();
        let expired = jwt.issue_access_token(&user(Role::User)).unwrap();

        assert!(matches!(
            jwt.verify(&expired, TokenKind::Access),
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            jwt.verify("not.a.token", TokenKind::Access),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let jwt = JwtManager::new(&config()).unwrap();
        let mut other_cfg = config();
        other_cfg.jwt_access_secret = "someone-else".to_string();
        let other = JwtManager::new(&other_cfg).unwrap();

        let token = other.issue_access_token(&user(Role::User)).unwrap();
        assert!(matches!(
            jwt.verify(&token, TokenKind::Access),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn identical_secrets_are_refused() {
        let mut cfg = config();
        cfg.jwt_refresh_secret = cfg.jwt_access_secret.clone();
        assert!(JwtManager::new(&cfg).is_err());
    }
}
