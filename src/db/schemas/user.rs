//! User document schema
//!
//! Stores account credentials alongside the principal's role and, for
//! admins, the department that scopes their case queue. Role and
//! department are set at registration and never change — there is no
//! role-change endpoint.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Role a principal acts under
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Individual,
    Lawyer,
    Mediator,
    Organization,
    Admin,
}

impl UserRole {
    pub fn parse(s: &str) -> Option<UserRole> {
        match s {
            "individual" => Some(UserRole::Individual),
            "lawyer" => Some(UserRole::Lawyer),
            "mediator" => Some(UserRole::Mediator),
            "organization" => Some(UserRole::Organization),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Individual => "individual",
            UserRole::Lawyer => "lawyer",
            UserRole::Mediator => "mediator",
            UserRole::Organization => "organization",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Login email, unique across the collection
    pub email: String,

    /// Display name
    pub full_name: String,

    /// Argon2 password hash
    pub password_hash: String,

    /// Role, immutable after registration
    #[serde(default)]
    pub role: UserRole,

    /// Department for admin accounts; None for everyone else
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,

    /// Token version for invalidation (increment to invalidate all tokens)
    #[serde(default)]
    pub token_version: i32,

    /// Whether the account may log in
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl UserDoc {
    /// Create a new user document
    pub fn new(
        email: String,
        full_name: String,
        password_hash: String,
        role: UserRole,
        department: Option<String>,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            email,
            full_name,
            password_hash,
            role,
            department,
            token_version: 1,
            is_active: true,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "email": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("email_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "role": 1, "department": 1 },
                Some(
                    IndexOptions::builder()
                        .name("role_department_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(UserRole::parse("individual"), Some(UserRole::Individual));
        assert_eq!(UserRole::parse("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("Admin"), None);
        assert_eq!(UserRole::parse("superuser"), None);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&UserRole::Mediator).unwrap();
        assert_eq!(json, "\"mediator\"");
    }
}
