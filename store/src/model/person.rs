use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::consts::consts::EntityId;

/// A person record as it exists in the store. Timestamps are owned by the
/// store: `created_at` is stamped on insert, `updated_at` on every mutation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Person {
    pub id: EntityId,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Person {
    pub fn new_test() -> Self {
        let now = Utc::now();

        Person {
            id: EntityId::new(),
            first_name: "First Name".to_string(),
            last_name: "Last Name".to_string(),
            email: Some("email@example.com".to_string()),
            phone: None,
            address: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields supplied by the caller when creating a person. The id and both
/// timestamps are generated on insert.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub enum UpdateStatement {
    Set(String),
    Unset,
    #[default]
    NoChanges,
}

/// Sparse set of field overrides for an update. `NoChanges` leaves the field
/// as stored, `Unset` clears a nullable field, `Set` replaces the value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct UpdatePersonData {
    pub first_name: UpdateStatement,
    pub last_name: UpdateStatement,
    pub email: UpdateStatement,
    pub phone: UpdateStatement,
    pub address: UpdateStatement,
}

impl UpdatePersonData {
    /// The email this update would persist, if it sets one.
    pub fn email_to_set(&self) -> Option<&str> {
        match &self.email {
            UpdateStatement::Set(email) => Some(email),
            UpdateStatement::Unset | UpdateStatement::NoChanges => None,
        }
    }
}
