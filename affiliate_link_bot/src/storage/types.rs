use serde::{Deserialize, Serialize};

/// Everything we remember about one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Their Telegram username, or a `user_<id>` placeholder.
    pub username: String,
    /// Their affiliate sub-id token, sent as `affExtParam1`.
    pub token: String,
    /// Channel to repost rewritten links to, if they linked one.
    /// Either `@username` or a `-100`-prefixed numeric id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}

impl UserRecord {
    #[must_use]
    pub fn new(username: String, token: String) -> Self {
        Self {
            username,
            token,
            channel_id: None,
        }
    }
}
