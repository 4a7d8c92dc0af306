use roster_db::models::user::User;
use serde::Serialize;

/// Topic for events published after a user record is created.
pub const TOPIC_USER_CREATED: &str = "create";

/// Topic for events published after a user record is updated.
pub const TOPIC_USER_UPDATED: &str = "update";

/// Notification payload for a user mutation.
///
/// An owned copy of the fields a notification needs. The bus clones it once
/// per subscriber, so no subscriber can observe another's copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEvent {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl From<&User> for UserEvent {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

impl UserEvent {
    /// Display name for messages, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.id)
    }
}
