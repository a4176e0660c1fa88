//! HTTP surface of the admin service.

pub mod error;
mod items;
mod regions;
mod session;


use self::error::ApiError;
use crate::auth::FirebaseAuth;
use crate::catalog::Catalog;
use crate::firestore::Firestore;
use crate::session::{resolve_access, Access, SignedInUser};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;
use axum::routing::{get, post, put};
use axum::Router;
use std::convert::Infallible;
use tower_http::trace::TraceLayer;

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: FirebaseAuth,
    pub firestore: Firestore,
    pub catalog: Catalog,
    pub check_revoked: bool,
}

impl AppState {
    async fn access(&self, parts: &Parts) -> Access {
        let access = resolve_access(
            &self.auth,
            &self.firestore,
            bearer_token(parts),
            self.check_revoked,
        )
        .await;
        // Live lists only run once an admin showed up.
        if access.is_admin() {
            self.catalog.subscribe();
        }
        access
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Whatever access the caller has; never rejects.
pub struct Caller(pub Access);

impl FromRequestParts<AppState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Caller(state.access(parts).await))
    }
}

/// A verified user, admin or not.
pub struct SignedIn(pub SignedInUser);

impl FromRequestParts<AppState> for SignedIn {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.access(parts).await {
            Access::Anonymous => Err(ApiError::Unauthorized),
            Access::Denied(user) | Access::Admin(user) => Ok(SignedIn(user)),
        }
    }
}

/// A verified admin.
pub struct Admin(pub SignedInUser);

impl FromRequestParts<AppState> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match state.access(parts).await {
            Access::Anonymous => Err(ApiError::Unauthorized),
            Access::Denied(_) => Err(ApiError::Forbidden),
            Access::Admin(user) => Ok(Admin(user)),
        }
    }
}

/// A JSON request body whose rejections use the API error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/session", get(session::get_session))
        .route("/session/sign-out", post(session::sign_out))
        .route("/tabs/{tab}", get(session::get_tab))
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/search", get(items::search_items))
        .route(
            "/items/{id}",
            put(items::update_item).delete(items::delete_item),
        )
        .route("/regions", get(regions::list_regions).post(regions::create_region))
        .route(
            "/regions/{id}",
            put(regions::update_region).delete(regions::delete_region),
        )
        .route("/regions/{id}/items", get(regions::list_region_items));

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
