use crate::auth::keys::{KeyFetchError, PublicKeyManager};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerated clock skew for `auth_time`, in seconds.
const AUTH_TIME_SKEW: i64 = 300;

#[derive(Error, Debug)]
pub enum TokenVerificationError {
    #[error("Key fetch error: {0}")]
    KeyFetchError(#[from] KeyFetchError),
    #[error("JWT validation error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Token has been revoked")]
    Revoked,
    #[error("User account is disabled")]
    UserDisabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseTokenClaims {
    pub aud: String,
    pub iss: String,
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub auth_time: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(flatten)]
    pub claims: serde_json::Map<String, serde_json::Value>,
}

/// Verifies Firebase ID tokens issued for one project.
#[derive(Clone)]
pub struct IdTokenVerifier {
    project_id: String,
    key_manager: PublicKeyManager,
}

impl IdTokenVerifier {
    pub fn new(project_id: String) -> Self {
        Self::new_with_keys(project_id, PublicKeyManager::new())
    }

    pub fn new_with_keys(project_id: String, key_manager: PublicKeyManager) -> Self {
        Self {
            project_id,
            key_manager,
        }
    }

    pub async fn verify_token(
        &self,
        token: &str,
    ) -> Result<FirebaseTokenClaims, TokenVerificationError> {
        let header = decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(TokenVerificationError::InvalidToken(format!(
                "Unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header.kid.ok_or_else(|| {
            TokenVerificationError::InvalidToken("Missing kid in header".to_string())
        })?;

        let public_key_pem = self.key_manager.get_key(&kid).await?;
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", self.project_id)]);

        let claims = decode::<FirebaseTokenClaims>(token, &key, &validation)?.claims;

        if claims.sub.is_empty() {
            return Err(TokenVerificationError::InvalidToken(
                "Subject (sub) claim must not be empty".to_string(),
            ));
        }

        let now = chrono::Utc::now().timestamp();
        if claims.auth_time > now + AUTH_TIME_SKEW {
            return Err(TokenVerificationError::InvalidToken(
                "Auth time is in the future".to_string(),
            ));
        }

        Ok(claims)
    }
}
