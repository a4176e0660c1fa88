//! Firebase Authentication: ID token verification and the few user-management
//! calls the admin service needs (lookup and refresh-token revocation).

pub mod keys;
pub mod models;
pub mod verifier;


use crate::auth::keys::PublicKeyManager;
use crate::auth::models::{
    GetAccountInfoRequest, GetAccountInfoResponse, RevokeTokensRequest, UserRecord,
};
use crate::auth::verifier::{FirebaseTokenClaims, IdTokenVerifier, TokenVerificationError};
use crate::core::middleware::{authorized_client, AuthMiddleware};
use crate::core::parse_error_response;
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

const IDENTITY_TOOLKIT_API: &str = "https://identitytoolkit.googleapis.com/v1/projects";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("User not found")]
    UserNotFound,
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error(transparent)]
    Token(#[from] TokenVerificationError),
}

#[derive(Clone)]
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    base_url: String,
    verifier: IdTokenVerifier,
}

impl FirebaseAuth {
    pub fn new(middleware: AuthMiddleware, project_id: &str) -> Self {
        Self {
            client: authorized_client(middleware),
            base_url: format!("{}/{}", IDENTITY_TOOLKIT_API, project_id),
            verifier: IdTokenVerifier::new(project_id.to_string()),
        }
    }

    /// Builds a client against custom endpoints, for emulators and tests.
    ///
    /// `base_url` is the project URL, e.g. `http://localhost:9099/v1/projects/my-project`.
    pub fn new_with_client(
        client: ClientWithMiddleware,
        base_url: String,
        project_id: &str,
        keys: PublicKeyManager,
    ) -> Self {
        Self {
            client,
            base_url,
            verifier: IdTokenVerifier::new_with_keys(project_id.to_string(), keys),
        }
    }

    pub async fn get_user(&self, uid: &str) -> Result<UserRecord, AuthError> {
        let url = format!("{}/accounts:lookup", self.base_url);
        let request = GetAccountInfoRequest {
            local_id: vec![uid.to_string()],
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "Get user failed").await,
            ));
        }

        let result: GetAccountInfoResponse = response.json().await?;

        result
            .users
            .and_then(|mut users| users.pop())
            .ok_or(AuthError::UserNotFound)
    }

    /// Invalidates every refresh token of `uid` issued before now.
    ///
    /// ID tokens already handed out stay valid until they expire unless callers
    /// verify with `check_revoked`.
    pub async fn revoke_refresh_tokens(&self, uid: &str) -> Result<(), AuthError> {
        let url = format!("{}/accounts:update", self.base_url);
        let request = RevokeTokensRequest {
            local_id: uid.to_string(),
            valid_since: chrono::Utc::now().timestamp().to_string(),
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "Revoke refresh tokens failed").await,
            ));
        }

        Ok(())
    }

    /// Verifies an ID token. With `check_revoked`, also rejects tokens of disabled
    /// users and tokens issued before the last revocation.
    pub async fn verify_id_token(
        &self,
        token: &str,
        check_revoked: bool,
    ) -> Result<FirebaseTokenClaims, AuthError> {
        let claims = self.verifier.verify_token(token).await?;

        if check_revoked {
            let user = self.get_user(&claims.sub).await?;
            if user.disabled {
                return Err(TokenVerificationError::UserDisabled.into());
            }
            if let Some(valid_since) = user.tokens_valid_after() {
                if claims.auth_time < valid_since {
                    return Err(TokenVerificationError::Revoked.into());
                }
            }
        }

        Ok(claims)
    }
}
