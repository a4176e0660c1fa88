use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub local_id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub display_name: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    /// Seconds since epoch; tokens issued before this instant are revoked.
    pub valid_since: Option<String>,
    pub last_login_at: Option<String>,
    pub created_at: Option<String>,
}

impl UserRecord {
    pub fn tokens_valid_after(&self) -> Option<i64> {
        self.valid_since.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GetAccountInfoRequest {
    pub local_id: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GetAccountInfoResponse {
    pub users: Option<Vec<UserRecord>>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RevokeTokensRequest {
    pub local_id: String,
    pub valid_since: String,
}
