use actix_web::{
    body::BoxBody, delete, get, http::StatusCode, post, put, web, HttpResponse,
    ResponseError, Scope,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use store::{
    consts::consts::EntityId,
    store::store::{PersonStore, StoreError},
};

use crate::contracts::{
    PageParams, PersonCreate, PersonRead, PersonUpdate, SearchParams, ValidationError,
};

/// Path prefix the person routes are registered under.
pub const API_PREFIX: &str = "/api/v1/persons";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Person not found")]
    NotFound,

    #[error("A person with this email already exists")]
    DuplicateEmail,

    #[error("Internal server error")]
    Store(#[source] StoreError),
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CannotUpdateDoesNotExist(_)
            | StoreError::CannotDeleteDoesNotExist(_) => ApiError::NotFound,
            StoreError::UniqueConstraintViolation(_) => ApiError::DuplicateEmail,
            StoreError::NotNullConstraintViolation(field) => {
                ApiError::Validation(ValidationError::NotNullable(field))
            }
            error => ApiError::Store(error),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        // Store internals are logged, never surfaced in the response body
        if let ApiError::Store(error) = self {
            log::error!("Store failure while handling a request: {}", error);
        }

        HttpResponse::build(self.status_code()).json(json!({ "detail": self.to_string() }))
    }
}

/// GET / -- page through every person, newest first
#[get("")]
async fn list_persons(
    store: web::Data<PersonStore>,
    page: web::Query<PageParams>,
) -> Result<HttpResponse, ApiError> {
    let (skip, limit) = page.into_inner().resolve()?;

    let session = store.session().await?;

    let persons = session.list(skip, limit).await?;

    Ok(HttpResponse::Ok().json(read_bodies(persons)))
}

/// GET /search -- case-insensitive substring search over the names
#[get("/search")]
async fn search_persons(
    store: web::Data<PersonStore>,
    query: web::Query<SearchParams>,
) -> Result<HttpResponse, ApiError> {
    let params = query.into_inner();

    let (skip, limit) = params.page().resolve()?;
    let term = params.term()?;

    let session = store.session().await?;

    let persons = session.search(term, skip, limit).await?;

    Ok(HttpResponse::Ok().json(read_bodies(persons)))
}

/// GET /{person_id}
#[get("/{person_id}")]
async fn get_person(
    store: web::Data<PersonStore>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = EntityId(path.into_inner());

    let session = store.session().await?;

    let person = session.get_by_id(id).await?.ok_or(ApiError::NotFound)?;

    Ok(HttpResponse::Ok().json(PersonRead::from_person(person)))
}

/// POST /
#[post("")]
async fn create_person(
    store: web::Data<PersonStore>,
    body: web::Json<PersonCreate>,
) -> Result<HttpResponse, ApiError> {
    let new_person = body.into_inner().into_new_person()?;

    let session = store.session().await?;

    // Fast-path duplicate report; the unique index remains the arbiter if a
    // concurrent create slips between this check and the insert
    if let Some(email) = &new_person.email {
        if session.find_by_email(email).await?.is_some() {
            return Err(ApiError::DuplicateEmail);
        }
    }

    let person = session.insert(new_person).await?;

    Ok(HttpResponse::Created().json(PersonRead::from_person(person)))
}

/// PUT /{person_id} -- partial update, omitted fields keep their value
#[put("/{person_id}")]
async fn update_person(
    store: web::Data<PersonStore>,
    path: web::Path<Uuid>,
    body: web::Json<PersonUpdate>,
) -> Result<HttpResponse, ApiError> {
    let id = EntityId(path.into_inner());
    let update = body.into_inner().into_update()?;

    let session = store.session().await?;

    let existing = session.get_by_id(id).await?.ok_or(ApiError::NotFound)?;

    // Re-setting the current email never conflicts with itself
    if let Some(email) = update.email_to_set() {
        if existing.email.as_deref() != Some(email)
            && session.find_by_email(email).await?.is_some()
        {
            return Err(ApiError::DuplicateEmail);
        }
    }

    let person = session.update(id, update).await?;

    Ok(HttpResponse::Ok().json(PersonRead::from_person(person)))
}

/// DELETE /{person_id} -- hard delete
#[delete("/{person_id}")]
async fn delete_person(
    store: web::Data<PersonStore>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let id = EntityId(path.into_inner());

    let session = store.session().await?;

    session.delete(id).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Person routes under the versioned prefix. `search` is registered before
/// the id route so `/search` is never parsed as a UUID path segment.
pub fn persons_scope() -> Scope {
    web::scope(API_PREFIX)
        .service(list_persons)
        .service(search_persons)
        .service(create_person)
        .service(get_person)
        .service(update_person)
        .service(delete_person)
}

fn read_bodies(persons: Vec<store::model::person::Person>) -> Vec<PersonRead> {
    persons.into_iter().map(PersonRead::from_person).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod error_mapping {
        use super::*;

        #[test]
        fn missing_records_map_to_not_found() {
            let id = EntityId::new();

            let update_error = ApiError::from(StoreError::CannotUpdateDoesNotExist(id));
            let delete_error = ApiError::from(StoreError::CannotDeleteDoesNotExist(id));

            assert_eq!(update_error.status_code(), StatusCode::NOT_FOUND);
            assert_eq!(delete_error.status_code(), StatusCode::NOT_FOUND);
        }

        #[test]
        fn a_lost_uniqueness_race_reads_like_the_pre_check() {
            let store_error =
                StoreError::UniqueConstraintViolation("a@x.com".to_string());

            let error = ApiError::from(store_error);

            assert!(matches!(error, ApiError::DuplicateEmail));
            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        }

        #[test]
        fn store_level_null_violations_read_like_validation() {
            let error = ApiError::from(StoreError::NotNullConstraintViolation("first_name"));

            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(error.to_string(), "first_name cannot be null");
        }

        #[test]
        fn infrastructure_failures_map_to_a_generic_500() {
            let error = ApiError::from(StoreError::Checkout(
                deadpool_postgres::PoolError::Closed,
            ));

            assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            // The response detail must not leak store internals
            assert_eq!(error.to_string(), "Internal server error");
        }

        #[test]
        fn validation_errors_are_bad_requests() {
            let error = ApiError::from(ValidationError::EmptySearchTerm);

            assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    mod error_body {
        use super::*;
        use actix_web::body::to_bytes;

        #[actix_web::test]
        async fn responses_carry_a_json_detail() {
            let response = ApiError::NotFound.error_response();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);

            let body = to_bytes(response.into_body()).await.expect("body should read");
            let json: serde_json::Value =
                serde_json::from_slice(&body).expect("body should be json");

            assert_eq!(json["detail"], "Person not found");
        }
    }
}
