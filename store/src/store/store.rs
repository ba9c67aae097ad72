use deadpool_postgres::{
    Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime,
};
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};

use crate::{
    consts::consts::EntityId,
    model::person::{NewPerson, Person, UpdatePersonData, UpdateStatement},
};

use super::{options::StoreOptions, schema};

#[derive(Error, Debug)]
pub enum StoreError {
    // CRUD - UPDATE
    #[error("Cannot update, record does not exist: {0}")]
    CannotUpdateDoesNotExist(EntityId),

    // CRUD - DELETE
    #[error("Cannot delete, record does not exist: {0}")]
    CannotDeleteDoesNotExist(EntityId),

    // Constraints
    #[error("Cannot persist row, a person already exists with this email: {0}")]
    UniqueConstraintViolation(String),

    #[error("Cannot set field to null: {0}")]
    NotNullConstraintViolation(&'static str),

    // Infrastructure
    #[error("Failed to create connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("Failed to check out a store connection: {0}")]
    Checkout(#[from] deadpool_postgres::PoolError),

    #[error("Store operation failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

/// Owns the connection pool over the person table. Cheap to clone; request
/// handlers check out one [`StoreSession`] each.
#[derive(Clone)]
pub struct PersonStore {
    pool: Pool,
}

impl PersonStore {
    pub fn new(options: &StoreOptions) -> Result<Self, StoreError> {
        let mut config = Config::new();
        config.host = Some(options.host.clone());
        config.port = Some(options.port);
        config.dbname = Some(options.dbname.clone());
        config.user = Some(options.user.clone());
        config.password = Some(options.password.clone());
        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        config.pool = Some(PoolConfig::new(options.pool_size));

        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Self { pool })
    }

    /// Applies the baseline schema. Run once at startup, before serving.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let connection = self.pool.get().await?;

        for statement in schema::STATEMENTS {
            connection.execute(statement, &[]).await?;
        }

        log::info!(
            "✅ Schema applied     [Statements: {}]",
            schema::STATEMENTS.len()
        );

        Ok(())
    }

    /// Checks out one pooled connection for the lifetime of a request.
    /// Dropping the session returns the connection, on every exit path.
    pub async fn session(&self) -> Result<StoreSession, StoreError> {
        Ok(StoreSession {
            connection: self.pool.get().await?,
        })
    }
}

/// Request-scoped unit of work. Every operation is a single autocommit
/// statement; there are no cross-operation transactions.
pub struct StoreSession {
    connection: Object,
}

impl StoreSession {
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Person>, StoreError> {
        let select = r#"
            SELECT "id", "first_name", "last_name", "email", "phone",
                   "address", "created_at", "updated_at"
            FROM "public"."person"
            ORDER BY "created_at" DESC
            OFFSET $1 LIMIT $2;
        "#;

        let rows = self.connection.query(select, &[&offset, &limit]).await?;

        Ok(rows.iter().map(person_from_row).collect())
    }

    /// Case-insensitive substring match over the first name, last name, and
    /// the space-joined full name.
    #[tracing::instrument(skip(self))]
    pub async fn search(
        &self,
        term: &str,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Person>, StoreError> {
        let select = r#"
            SELECT "id", "first_name", "last_name", "email", "phone",
                   "address", "created_at", "updated_at"
            FROM "public"."person"
            WHERE "first_name" ILIKE $1
               OR "last_name" ILIKE $1
               OR ("first_name" || ' ' || "last_name") ILIKE $1
            ORDER BY "first_name", "last_name"
            OFFSET $2 LIMIT $3;
        "#;

        let pattern = like_pattern(term);

        let rows = self
            .connection
            .query(select, &[&pattern, &offset, &limit])
            .await?;

        Ok(rows.iter().map(person_from_row).collect())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_by_id(&self, id: EntityId) -> Result<Option<Person>, StoreError> {
        let select = r#"
            SELECT "id", "first_name", "last_name", "email", "phone",
                   "address", "created_at", "updated_at"
            FROM "public"."person"
            WHERE "id" = $1;
        "#;

        let row = self.connection.query_opt(select, &[&id.as_uuid()]).await?;

        Ok(row.as_ref().map(person_from_row))
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Person>, StoreError> {
        let select = r#"
            SELECT "id", "first_name", "last_name", "email", "phone",
                   "address", "created_at", "updated_at"
            FROM "public"."person"
            WHERE "email" = $1;
        "#;

        let row = self.connection.query_opt(select, &[&email]).await?;

        Ok(row.as_ref().map(person_from_row))
    }

    /// Persists a new person. The id is generated here; the store stamps
    /// both timestamps and the returned record is the row as persisted.
    #[tracing::instrument(skip(self, person))]
    pub async fn insert(&self, person: NewPerson) -> Result<Person, StoreError> {
        let insert = r#"
            INSERT INTO "public"."person"
                ("id", "first_name", "last_name", "email", "phone", "address")
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING "id", "first_name", "last_name", "email", "phone",
                      "address", "created_at", "updated_at";
        "#;

        let id = EntityId::new();

        let row = self
            .connection
            .query_one(
                insert,
                &[
                    &id.as_uuid(),
                    &person.first_name,
                    &person.last_name,
                    &person.email,
                    &person.phone,
                    &person.address,
                ],
            )
            .await
            .map_err(|error| map_unique_violation(error, person.email.as_deref()))?;

        Ok(person_from_row(&row))
    }

    /// Each update is broken up into 3 steps
    ///  - fetch the current state
    ///  - merge the sparse overrides, verifying constraints
    ///  - write the merged row, refreshing `updated_at`
    #[tracing::instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: EntityId,
        update: UpdatePersonData,
    ) -> Result<Person, StoreError> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or(StoreError::CannotUpdateDoesNotExist(id))?;

        let merged = apply_update(&existing, &update)?;

        let update_row = r#"
            UPDATE "public"."person"
            SET "first_name" = $2, "last_name" = $3, "email" = $4,
                "phone" = $5, "address" = $6, "updated_at" = now()
            WHERE "id" = $1
            RETURNING "id", "first_name", "last_name", "email", "phone",
                      "address", "created_at", "updated_at";
        "#;

        let row = self
            .connection
            .query_opt(
                update_row,
                &[
                    &id.as_uuid(),
                    &merged.first_name,
                    &merged.last_name,
                    &merged.email,
                    &merged.phone,
                    &merged.address,
                ],
            )
            .await
            .map_err(|error| map_unique_violation(error, merged.email.as_deref()))?
            // The record can disappear between the fetch and the write
            .ok_or(StoreError::CannotUpdateDoesNotExist(id))?;

        Ok(person_from_row(&row))
    }

    /// Hard delete, no tombstone.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: EntityId) -> Result<(), StoreError> {
        let delete = r#"DELETE FROM "public"."person" WHERE "id" = $1;"#;

        let deleted = self.connection.execute(delete, &[&id.as_uuid()]).await?;

        if deleted == 0 {
            return Err(StoreError::CannotDeleteDoesNotExist(id));
        }

        Ok(())
    }
}

/// Explicit merge of a sparse update over the stored record: `Set` replaces
/// a field, `Unset` clears a nullable field, `NoChanges` keeps the stored
/// value. Returns the record to persist; `updated_at` is refreshed by the
/// write itself.
pub fn apply_update(
    person: &Person,
    update: &UpdatePersonData,
) -> Result<Person, StoreError> {
    let mut current = person.clone();

    match &update.first_name {
        UpdateStatement::Set(first_name) => current.first_name = first_name.clone(),
        UpdateStatement::Unset => {
            return Err(StoreError::NotNullConstraintViolation("first_name"))
        }
        UpdateStatement::NoChanges => {}
    }

    match &update.last_name {
        UpdateStatement::Set(last_name) => current.last_name = last_name.clone(),
        UpdateStatement::Unset => {
            return Err(StoreError::NotNullConstraintViolation("last_name"))
        }
        UpdateStatement::NoChanges => {}
    }

    match &update.email {
        UpdateStatement::Set(email) => current.email = Some(email.clone()),
        UpdateStatement::Unset => current.email = None,
        UpdateStatement::NoChanges => {}
    }

    match &update.phone {
        UpdateStatement::Set(phone) => current.phone = Some(phone.clone()),
        UpdateStatement::Unset => current.phone = None,
        UpdateStatement::NoChanges => {}
    }

    match &update.address {
        UpdateStatement::Set(address) => current.address = Some(address.clone()),
        UpdateStatement::Unset => current.address = None,
        UpdateStatement::NoChanges => {}
    }

    Ok(current)
}

/// The unique email index is the authoritative backstop for the handler
/// level pre-check; a lost race surfaces here as SQLSTATE 23505.
fn map_unique_violation(error: tokio_postgres::Error, email: Option<&str>) -> StoreError {
    if error.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        return StoreError::UniqueConstraintViolation(
            email.unwrap_or_default().to_string(),
        );
    }

    StoreError::Postgres(error)
}

/// Wraps the term in wildcards for ILIKE, escaping the characters LIKE
/// treats specially so user input always matches literally.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);

    pattern.push('%');

    for character in term.chars() {
        if matches!(character, '%' | '_' | '\\') {
            pattern.push('\\');
        }

        pattern.push(character);
    }

    pattern.push('%');

    pattern
}

fn person_from_row(row: &Row) -> Person {
    Person {
        id: EntityId(row.get("id")),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        email: row.get("email"),
        phone: row.get("phone"),
        address: row.get("address"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod merge {
        use super::*;
        use rstest::rstest;

        #[test]
        fn updating_only_the_phone_leaves_other_fields_untouched() {
            // Given a stored person
            let person = Person::new_test();

            // When only the phone is set
            let update = UpdatePersonData {
                phone: UpdateStatement::Set("0400 000 000".to_string()),
                ..Default::default()
            };

            let merged = apply_update(&person, &update).expect("merge should succeed");

            // Then every other field matches the stored person
            assert_eq!(merged.phone.as_deref(), Some("0400 000 000"));
            assert_eq!(merged.id, person.id);
            assert_eq!(merged.first_name, person.first_name);
            assert_eq!(merged.last_name, person.last_name);
            assert_eq!(merged.email, person.email);
            assert_eq!(merged.address, person.address);
            assert_eq!(merged.created_at, person.created_at);
        }

        #[test]
        fn empty_update_is_the_identity() {
            let person = Person::new_test();

            let merged = apply_update(&person, &UpdatePersonData::default())
                .expect("merge should succeed");

            assert_eq!(merged, person);
        }

        #[test]
        fn set_replaces_both_names() {
            let person = Person::new_test();

            let update = UpdatePersonData {
                first_name: UpdateStatement::Set("Jean".to_string()),
                last_name: UpdateStatement::Set("Dupont".to_string()),
                ..Default::default()
            };

            let merged = apply_update(&person, &update).expect("merge should succeed");

            assert_eq!(merged.first_name, "Jean");
            assert_eq!(merged.last_name, "Dupont");
        }

        #[rstest]
        #[case::email(UpdatePersonData {
            email: UpdateStatement::Unset,
            ..Default::default()
        })]
        #[case::phone(UpdatePersonData {
            phone: UpdateStatement::Unset,
            ..Default::default()
        })]
        #[case::address(UpdatePersonData {
            address: UpdateStatement::Unset,
            ..Default::default()
        })]
        fn unset_clears_optional_fields(#[case] update: UpdatePersonData) {
            // Given a person with every optional field populated
            let mut person = Person::new_test();
            person.phone = Some("0400 000 000".to_string());
            person.address = Some("1 Example St".to_string());

            // When the optional field is unset
            let merged = apply_update(&person, &update).expect("merge should succeed");

            // Then exactly that field is cleared
            let cleared = [
                merged.email.is_none(),
                merged.phone.is_none(),
                merged.address.is_none(),
            ];

            assert_eq!(cleared.iter().filter(|&&c| c).count(), 1);
        }

        #[rstest]
        #[case::first_name(UpdatePersonData {
            first_name: UpdateStatement::Unset,
            ..Default::default()
        }, "first_name")]
        #[case::last_name(UpdatePersonData {
            last_name: UpdateStatement::Unset,
            ..Default::default()
        }, "last_name")]
        fn unset_on_a_required_field_is_a_constraint_violation(
            #[case] update: UpdatePersonData,
            #[case] field: &str,
        ) {
            let person = Person::new_test();

            let result = apply_update(&person, &update)
                .err()
                .expect("should error");

            match result {
                StoreError::NotNullConstraintViolation(violated) => {
                    assert_eq!(violated, field)
                }
                other => panic!("expected not-null violation, got: {other}"),
            }
        }
    }

    mod search_pattern {
        use super::*;

        #[test]
        fn wraps_the_term_in_wildcards() {
            assert_eq!(like_pattern("jean"), "%jean%");
        }

        #[test]
        fn escapes_like_metacharacters() {
            assert_eq!(like_pattern("100%"), r"%100\%%");
            assert_eq!(like_pattern("a_b"), r"%a\_b%");
            assert_eq!(like_pattern(r"a\b"), r"%a\\b%");
        }

        #[test]
        fn preserves_spaces_for_full_name_matches() {
            assert_eq!(like_pattern("jean dupont"), "%jean dupont%");
        }
    }
}
