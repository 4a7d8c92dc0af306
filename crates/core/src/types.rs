/// User identifiers are server-generated UUID strings.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, random user identifier.
pub fn new_user_id() -> UserId {
    uuid::Uuid::new_v4().to_string()
}
