use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use store::model::person::{NewPerson, Person, UpdatePersonData, UpdateStatement};

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("{0} must be between 1 and 100 characters")]
    NameLength(&'static str),

    #[error("{0} cannot be null")]
    NotNullable(&'static str),

    #[error("email is not a valid email address")]
    InvalidEmail,

    #[error("email must be at most 255 characters")]
    EmailTooLong,

    #[error("phone must be at most 20 characters")]
    PhoneTooLong,

    #[error("search term must not be empty")]
    EmptySearchTerm,

    #[error("skip must be greater than or equal to 0")]
    NegativeSkip,

    #[error("limit must be between 1 and 100")]
    LimitOutOfRange,
}

/// Tri-state for update bodies. Serde alone cannot tell an absent key from
/// an explicit `null`, so absence comes from `#[serde(default)]` and the
/// null/value split from the `Deserialize` impl below.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Nullable<T> {
    #[default]
    ImplicitNull,
    ExplicitNull,
    Some(T),
}

impl<'de, T> Deserialize<'de> for Nullable<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Nullable::Some(value),
            None => Nullable::ExplicitNull,
        })
    }
}

/// Create contract: names are required, everything else optional.
#[derive(Deserialize, Clone, Debug)]
pub struct PersonCreate {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl PersonCreate {
    pub fn into_new_person(self) -> Result<NewPerson, ValidationError> {
        validate_name("first_name", &self.first_name)?;
        validate_name("last_name", &self.last_name)?;

        if let Some(email) = &self.email {
            validate_email(email)?;
        }

        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }

        Ok(NewPerson {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
        })
    }
}

/// Update contract: every field optional, omitted fields are left as
/// stored, an explicit `null` clears a nullable field.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct PersonUpdate {
    #[serde(default)]
    pub first_name: Nullable<String>,
    #[serde(default)]
    pub last_name: Nullable<String>,
    #[serde(default)]
    pub email: Nullable<String>,
    #[serde(default)]
    pub phone: Nullable<String>,
    #[serde(default)]
    pub address: Nullable<String>,
}

impl PersonUpdate {
    pub fn into_update(self) -> Result<UpdatePersonData, ValidationError> {
        let first_name = match self.first_name {
            Nullable::ImplicitNull => UpdateStatement::NoChanges,
            Nullable::ExplicitNull => return Err(ValidationError::NotNullable("first_name")),
            Nullable::Some(value) => {
                validate_name("first_name", &value)?;
                UpdateStatement::Set(value)
            }
        };

        let last_name = match self.last_name {
            Nullable::ImplicitNull => UpdateStatement::NoChanges,
            Nullable::ExplicitNull => return Err(ValidationError::NotNullable("last_name")),
            Nullable::Some(value) => {
                validate_name("last_name", &value)?;
                UpdateStatement::Set(value)
            }
        };

        let email = match self.email {
            Nullable::ImplicitNull => UpdateStatement::NoChanges,
            Nullable::ExplicitNull => UpdateStatement::Unset,
            Nullable::Some(value) => {
                validate_email(&value)?;
                UpdateStatement::Set(value)
            }
        };

        let phone = match self.phone {
            Nullable::ImplicitNull => UpdateStatement::NoChanges,
            Nullable::ExplicitNull => UpdateStatement::Unset,
            Nullable::Some(value) => {
                validate_phone(&value)?;
                UpdateStatement::Set(value)
            }
        };

        let address = match self.address {
            Nullable::ImplicitNull => UpdateStatement::NoChanges,
            Nullable::ExplicitNull => UpdateStatement::Unset,
            Nullable::Some(value) => UpdateStatement::Set(value),
        };

        Ok(UpdatePersonData {
            first_name,
            last_name,
            email,
            phone,
            address,
        })
    }
}

/// Read contract: the body of every successful non-delete response.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PersonRead {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonRead {
    pub fn from_person(person: Person) -> PersonRead {
        PersonRead {
            id: person.id.as_uuid(),
            first_name: person.first_name,
            last_name: person.last_name,
            email: person.email,
            phone: person.phone,
            address: person.address,
            created_at: person.created_at,
            updated_at: person.updated_at,
        }
    }
}

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

#[derive(Deserialize, Clone, Copy, Debug, Default)]
pub struct PageParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Applies the defaults and bounds: `skip >= 0`, `1 <= limit <= 100`.
    pub fn resolve(self) -> Result<(i64, i64), ValidationError> {
        let skip = self.skip.unwrap_or(0);

        if skip < 0 {
            return Err(ValidationError::NegativeSkip);
        }

        let limit = self.limit.unwrap_or(DEFAULT_LIMIT);

        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(ValidationError::LimitOutOfRange);
        }

        Ok((skip, limit))
    }
}

// Note: serde_urlencoded cannot flatten typed fields, so the page params
// are repeated here instead of `#[serde(flatten)]`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl SearchParams {
    pub fn term(&self) -> Result<&str, ValidationError> {
        match self.q.as_deref() {
            Some(term) if !term.is_empty() => Ok(term),
            _ => Err(ValidationError::EmptySearchTerm),
        }
    }

    pub fn page(&self) -> PageParams {
        PageParams {
            skip: self.skip,
            limit: self.limit,
        }
    }
}

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

    EMAIL_REGEX
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern should compile"))
}

fn validate_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let length = value.chars().count();

    if !(1..=100).contains(&length) {
        return Err(ValidationError::NameLength(field));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.chars().count() > 255 {
        return Err(ValidationError::EmailTooLong);
    }

    if !email_regex().is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }

    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.chars().count() > 20 {
        return Err(ValidationError::PhoneTooLong);
    }

    Ok(())
}
