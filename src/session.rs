//! Who is asking, and what they get to see.
//!
//! A request carries an optional Firebase ID token. Verified users are looked
//! up in `admins/{uid}`; only admins reach the management tabs.

use crate::auth::verifier::FirebaseTokenClaims;
use crate::auth::FirebaseAuth;
use crate::catalog::models::AdminRecord;
use crate::firestore::Firestore;
use serde::Serialize;
use std::str::FromStr;

pub const ADMINS: &str = "admins";
pub const ACCESS_DENIED: &str = "Zugriff verweigert.";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignedInUser {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<FirebaseTokenClaims> for SignedInUser {
    fn from(claims: FirebaseTokenClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Anonymous,
    Denied(SignedInUser),
    Admin(SignedInUser),
}

impl Access {
    pub fn user(&self) -> Option<&SignedInUser> {
        match self {
            Access::Anonymous => None,
            Access::Denied(user) | Access::Admin(user) => Some(user),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Access::Admin(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Loading,
    Landing,
    AccessDenied,
    Dashboard,
}

impl View {
    /// Admins see `Loading` until both live lists have arrived.
    pub fn for_access(access: &Access, synced: bool) -> Self {
        match access {
            Access::Anonymous => View::Landing,
            Access::Denied(_) => View::AccessDenied,
            Access::Admin(_) if !synced => View::Loading,
            Access::Admin(_) => View::Dashboard,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Tab {
    #[default]
    Search,
    ManageItems,
    ManageRegions,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Search, Tab::ManageItems, Tab::ManageRegions];

    pub fn label(self) -> &'static str {
        match self {
            Tab::Search => "Suchen",
            Tab::ManageItems => "Artikel erstellen",
            Tab::ManageRegions => "Gebiete verwalten",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Tab::Search => "search",
            Tab::ManageItems => "manageItems",
            Tab::ManageRegions => "manageRegions",
        }
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|tab| tab.key() == s)
            .ok_or_else(|| format!("Unbekannter Tab: {}", s))
    }
}

/// Reads `admins/{uid}`. Lookup failures count as "not an admin".
pub async fn lookup_admin(firestore: &Firestore, uid: &str) -> bool {
    match firestore.collection(ADMINS).doc(uid).get::<AdminRecord>().await {
        Ok(Some(record)) => record.grants_admin(),
        Ok(None) => false,
        Err(e) => {
            tracing::error!(uid, error = %e, "Error fetching admin status");
            false
        }
    }
}

/// Resolves the caller's access from an optional bearer token.
pub async fn resolve_access(
    auth: &FirebaseAuth,
    firestore: &Firestore,
    token: Option<&str>,
    check_revoked: bool,
) -> Access {
    let Some(token) = token else {
        return Access::Anonymous;
    };

    let user = match auth.verify_id_token(token, check_revoked).await {
        Ok(claims) => SignedInUser::from(claims),
        Err(e) => {
            tracing::warn!(error = %e, "rejected ID token");
            return Access::Anonymous;
        }
    };

    if lookup_admin(firestore, &user.uid).await {
        Access::Admin(user)
    } else {
        tracing::info!(uid = %user.uid, "access denied for non-admin user");
        Access::Denied(user)
    }
}

/// Signs the user out everywhere by revoking their refresh tokens.
/// Failures are logged only.
pub async fn sign_out(auth: &FirebaseAuth, user: &SignedInUser) {
    match auth.revoke_refresh_tokens(&user.uid).await {
        Ok(()) => tracing::info!(uid = %user.uid, "signed out"),
        Err(e) => tracing::error!(uid = %user.uid, error = %e, "Sign out error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use reqwest::Client;
    use reqwest_middleware::ClientBuilder;
    use serde_json::json;

    fn user() -> SignedInUser {
        SignedInUser {
            uid: "u1".into(),
            email: None,
        }
    }

    fn firestore(server: &MockServer) -> Firestore {
        let client = ClientBuilder::new(Client::new()).build();
        Firestore::new_with_client(client, &server.url("/v1"), "test-project")
    }

    fn mock_admin(server: &MockServer, uid: &str, status: u16, body: serde_json::Value) {
        let path = format!(
            "/v1/projects/test-project/databases/(default)/documents/admins/{}",
            uid
        );
        server.mock(move |when, then| {
            when.method(GET).path(path);
            then.status(status).json_body(body);
        });
    }

    #[test]
    fn views_follow_access() {
        assert_eq!(View::for_access(&Access::Anonymous, true), View::Landing);
        assert_eq!(View::for_access(&Access::Denied(user()), true), View::AccessDenied);
        assert_eq!(View::for_access(&Access::Admin(user()), false), View::Loading);
        assert_eq!(View::for_access(&Access::Admin(user()), true), View::Dashboard);
    }

    #[test]
    fn tabs_parse_and_label() {
        assert_eq!("manageRegions".parse::<Tab>(), Ok(Tab::ManageRegions));
        assert!("settings".parse::<Tab>().is_err());
        assert_eq!(Tab::default(), Tab::Search);
        assert_eq!(Tab::ManageItems.label(), "Artikel erstellen");
    }

    #[tokio::test]
    async fn admin_flag_must_be_boolean_true() {
        let server = MockServer::start();
        let db = firestore(&server);
        let doc = |value: serde_json::Value| {
            json!({
                "name": "projects/test-project/databases/(default)/documents/admins/x",
                "fields": { "isAdmin": value }
            })
        };

        mock_admin(&server, "yes", 200, doc(json!({ "booleanValue": true })));
        mock_admin(&server, "no", 200, doc(json!({ "booleanValue": false })));
        mock_admin(&server, "string", 200, doc(json!({ "stringValue": "true" })));
        mock_admin(
            &server,
            "missing",
            404,
            json!({ "error": { "code": 404, "message": "not found" } }),
        );
        mock_admin(
            &server,
            "broken",
            500,
            json!({ "error": { "code": 500, "message": "boom" } }),
        );

        assert!(lookup_admin(&db, "yes").await);
        assert!(!lookup_admin(&db, "no").await);
        assert!(!lookup_admin(&db, "string").await);
        assert!(!lookup_admin(&db, "missing").await);
        assert!(!lookup_admin(&db, "broken").await);
    }
}
