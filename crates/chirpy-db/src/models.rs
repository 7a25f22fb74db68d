//! Records persisted in the flat store, plus the document that holds them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chirp {
    pub id: u64,
    pub author_id: u64,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    /// Older store files wrote this field as `password`.
    #[serde(alias = "password")]
    pub password_hash: String,
    #[serde(default)]
    pub is_chirpy_red: bool,
}

/// Input for `Database::create_user`. Id and upgrade flag are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

/// Replacement credentials for an existing user.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub id: u64,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokedToken {
    /// The raw refresh token string.
    pub id: String,
    pub revoked_at: DateTime<Utc>,
}

/// The whole on-disk JSON document, keyed by collection name.
///
/// Top-level keys this crate does not know about are kept in `other` so a
/// rewrite never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub chirps: Vec<Chirp>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tokens: Vec<RevokedToken>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}
