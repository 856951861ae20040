use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Request body for signup, login and password reset.
///
/// Fields are optional so that a missing field is reported by the handler
/// with the route's own message instead of a deserializer rejection.
#[derive(Debug, Default, Deserialize)]
pub struct UserBody {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Request body for biography updates.
#[derive(Debug, Default, Deserialize)]
pub struct BiographyBody {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
}

/// User as handed to the service on signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub date_joined: OffsetDateTime,
}

/// Partial update. Handlers only ever set one of the two fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub password: Option<String>,
    pub biography: Option<String>,
}

impl UserUpdate {
    pub fn password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
            biography: None,
        }
    }

    pub fn biography(biography: impl Into<String>) -> Self {
        Self {
            password: None,
            biography: Some(biography.into()),
        }
    }
}

/// Public part of the user returned to the client. Has no password field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeUser {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub username: String,
    #[serde(rename = "dateJoined", with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biography: Option<String>,
}
