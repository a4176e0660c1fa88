//! Cloud Firestore module.
//!
//! A compact REST client for the document operations the admin service needs:
//! reading single documents, writing and deleting them, adding documents with
//! generated IDs, listing collections and keeping live snapshot subscriptions.
//!
//! # Real-time Updates
//!
//! `CollectionReference::on_snapshot` keeps a `documents:listen` stream open and
//! calls back with the full result set whenever it changes.

pub mod listen;
pub mod models;
pub mod reference;
pub mod snapshot;
pub mod watch;


use self::reference::{CollectionReference, DocumentReference};
use crate::core::middleware::{authorized_client, AuthMiddleware};
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

const FIRESTORE_V1_API: &str = "https://firestore.googleapis.com/v1";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Client for interacting with Cloud Firestore.
#[derive(Clone, Debug)]
pub struct Firestore {
    client: ClientWithMiddleware,
    database_url: String,
    database_name: String,
}

impl Firestore {
    /// Creates a client for the `(default)` database of `project_id`.
    pub fn new(middleware: AuthMiddleware, project_id: &str) -> Self {
        Self::new_with_client(authorized_client(middleware), FIRESTORE_V1_API, project_id)
    }

    /// Creates a client against a custom API root, e.g. an emulator or a mock server.
    ///
    /// `api_root` is the part before `/projects/...`, such as `http://localhost:8080/v1`.
    pub fn new_with_client(client: ClientWithMiddleware, api_root: &str, project_id: &str) -> Self {
        let database_name = format!("projects/{}/databases/(default)", project_id);
        let database_url = format!("{}/{}", api_root.trim_end_matches('/'), database_name);
        Self {
            client,
            database_url,
            database_name,
        }
    }

    /// Gets a `CollectionReference` for a root collection.
    ///
    /// # Arguments
    ///
    /// * `collection_id` - The ID of the collection (e.g., "items").
    pub fn collection(&self, collection_id: &str) -> CollectionReference {
        CollectionReference {
            client: self.client.clone(),
            database_url: self.database_url.clone(),
            database_name: self.database_name.clone(),
            collection_id: collection_id.to_string(),
        }
    }

    /// Gets a `DocumentReference` from a slash-separated path (e.g., "admins/uid1").
    pub fn doc(&self, document_path: &str) -> DocumentReference {
        DocumentReference {
            client: self.client.clone(),
            path: format!("{}/documents/{}", self.database_url, document_path),
        }
    }
}
