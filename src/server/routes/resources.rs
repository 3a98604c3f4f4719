//! CRUD handlers for schema-backed collections.
//!
//! HTTP methods map onto permission actions: GET → read, POST → create,
//! PUT → update, DELETE → delete. Every handler authorizes before touching
//! the store; the server stamps `_id` on create and `_v` on create/update.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::broker::{Action, Event};
use crate::store::{Resource, Value};

use super::super::{auth, error::ApiError, state::AppState};

/// Query parameters for listing a collection.
#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    /// Field to order the result by.
    pub sort: Option<String>,
}

/// List every resource in a collection.
pub async fn list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Resource>>, ApiError> {
    let user = auth::resolve_user(&state, &headers);
    state
        .store()
        .authorize(&collection, None, "read", user.as_ref())?;

    let resources = state.store().list(&collection, query.sort.as_deref())?;
    Ok(Json(resources))
}

/// Create a resource and publish a `created` event.
pub async fn create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    headers: HeaderMap,
    Json(resource): Json<Resource>,
) -> Result<Response, ApiError> {
    let user = auth::resolve_user(&state, &headers);
    state
        .store()
        .authorize(&collection, None, "create", user.as_ref())?;

    let created = state.store().create(&collection, resource)?;
    let id = created
        .get("_id")
        .and_then(Value::as_text)
        .unwrap_or_default()
        .to_string();
    let location = format!("/api/{collection}/{id}");
    state.broker().publish(
        &collection,
        Event {
            action: Action::Created,
            id,
            data: created,
        },
    );

    Ok((StatusCode::CREATED, [(header::LOCATION, location)]).into_response())
}

/// Read one resource.
pub async fn get(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Resource>, ApiError> {
    let user = auth::resolve_user(&state, &headers);
    state
        .store()
        .authorize(&collection, Some(&id), "read", user.as_ref())?;

    let resource = state
        .store()
        .get(&collection, &id)?
        .ok_or_else(|| ApiError::not_found(format!("record {id:?} not found")))?;
    Ok(Json(resource))
}

/// Update a resource (partial: absent fields keep their stored values) and
/// publish an `updated` event.
pub async fn update(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(mut resource): Json<Resource>,
) -> Result<StatusCode, ApiError> {
    let user = auth::resolve_user(&state, &headers);
    state
        .store()
        .authorize(&collection, Some(&id), "update", user.as_ref())?;

    resource.insert("_id".to_string(), Value::Text(id.clone()));
    let updated = state.store().update(&collection, resource)?;
    state.broker().publish(
        &collection,
        Event {
            action: Action::Updated,
            id,
            data: updated,
        },
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Delete a resource and publish a `deleted` event.
pub async fn delete(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = auth::resolve_user(&state, &headers);
    state
        .store()
        .authorize(&collection, Some(&id), "delete", user.as_ref())?;

    state.store().delete(&collection, &id)?;
    state.broker().publish(
        &collection,
        Event {
            action: Action::Deleted,
            id,
            data: Resource::new(),
        },
    );

    Ok(StatusCode::NO_CONTENT)
}
