//! Stored user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use watch_shop_core::{Email, OwnerSummary, Role, UserId, UserProfile};

/// A user as held by the credential store.
///
/// `password_hash` is an argon2id PHC string for local accounts and `None`
/// for accounts that only ever signed in with Google.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub full_name: String,
    pub email: Email,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password_hash: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub google_id: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Build a fresh record with a new ID and the current timestamp.
    #[must_use]
    pub fn new(full_name: String, email: Email, phone: String, role: Role) -> Self {
        Self {
            id: UserId::generate(),
            full_name,
            email,
            phone,
            password_hash: None,
            role,
            google_id: None,
            avatar: None,
            created_at: Utc::now(),
        }
    }

    /// Public projection with credential material stripped.
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role,
            google_id: self.google_id.clone(),
            avatar: self.avatar.clone(),
            created_at: self.created_at,
        }
    }

    /// Fields denormalized onto order responses.
    #[must_use]
    pub fn owner_summary(&self) -> OwnerSummary {
        OwnerSummary {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}
