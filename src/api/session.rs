use super::error::ApiError;
use super::{Admin, AppState, Caller, SignedIn};
use crate::catalog::models::{Item, Region};
use crate::session::{self as access, SignedInUser, Tab, View};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TabInfo {
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub view: View,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<SignedInUser>,
    pub tabs: Vec<TabInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

pub async fn get_session(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> Json<SessionResponse> {
    let view = View::for_access(&caller, state.catalog.is_synced());
    let admin = caller.is_admin();

    let tabs = if admin {
        Tab::ALL
            .into_iter()
            .map(|tab| TabInfo {
                key: tab.key(),
                label: tab.label(),
            })
            .collect()
    } else {
        Vec::new()
    };

    Json(SessionResponse {
        view,
        user: caller.user().cloned(),
        tabs,
        db_error: if admin { state.catalog.db_error() } else { None },
    })
}

pub async fn sign_out(State(state): State<AppState>, SignedIn(user): SignedIn) -> StatusCode {
    access::sign_out(&state.auth, &user).await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabResponse {
    pub tab: Tab,
    pub items: Vec<Item>,
    pub regions: Vec<Region>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_error: Option<String>,
}

/// The data a tab is rendered from. All three tabs work on both lists.
pub async fn get_tab(
    State(state): State<AppState>,
    _admin: Admin,
    Path(tab): Path<String>,
) -> Result<Json<TabResponse>, ApiError> {
    let tab: Tab = tab.parse().map_err(ApiError::NotFound)?;

    Ok(Json(TabResponse {
        tab,
        items: state.catalog.items(),
        regions: state.catalog.regions(),
        db_error: state.catalog.db_error(),
    }))
}
