//! Admin service for items grouped by regions.
//!
//! Items, regions and admin flags live in Cloud Firestore; users sign in with
//! Firebase Authentication. `AdminApp` wires both clients from one service
//! account, and `api::create_router` exposes the management surface over HTTP.

pub mod api;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod core;
pub mod firestore;
pub mod session;

use crate::auth::FirebaseAuth;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::core::middleware::AuthMiddleware;
use crate::firestore::Firestore;
use thiserror::Error;
use yup_oauth2::ServiceAccountKey;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("failed to read service account key: {0}")]
    Credentials(#[from] std::io::Error),
    #[error("no project id: set FIREBASE_PROJECT_ID or use a key with project_id")]
    MissingProjectId,
}

pub struct AdminApp {
    middleware: AuthMiddleware,
    project_id: String,
}

impl AdminApp {
    pub fn new(
        service_account_key: ServiceAccountKey,
        project_id: Option<String>,
    ) -> Result<Self, AppError> {
        let project_id = project_id
            .or_else(|| service_account_key.project_id.clone())
            .ok_or(AppError::MissingProjectId)?;

        Ok(Self {
            middleware: AuthMiddleware::new(service_account_key),
            project_id,
        })
    }

    /// Loads the key file named in `config`.
    pub async fn from_config(config: &Config) -> Result<Self, AppError> {
        let key = yup_oauth2::read_service_account_key(&config.credentials_path).await?;
        Self::new(key, config.project_id.clone())
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn auth(&self) -> FirebaseAuth {
        FirebaseAuth::new(self.middleware.clone(), &self.project_id)
    }

    pub fn firestore(&self) -> Firestore {
        Firestore::new(self.middleware.clone(), &self.project_id)
    }

    /// Builds the HTTP handler state. Subscriptions start with the first admin request.
    pub fn state(&self, config: &Config) -> api::AppState {
        let firestore = self.firestore();
        api::AppState {
            auth: self.auth(),
            catalog: Catalog::new(firestore.clone(), config.listen_retry),
            firestore,
            check_revoked: config.check_revoked,
        }
    }
}
