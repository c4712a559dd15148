use serde::{Deserialize, Serialize};

/// Player identity as known to the sign-up system.
///
/// Identity itself is owned by the authentication provider; we only keep the
/// display name we last saw so organizers can tell entries apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: String,
    pub username: String,
}

impl Player {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}
