//! The HTTP surface of the document store, mounted under `/ns`.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use models::{Document, DocumentList, Id, Namespace};

use crate::{Coordinator, Error};

struct App {
    coordinator: Coordinator,
}

/// Build the service router.
pub fn build_router(coordinator: Coordinator) -> Router {
    let app = Arc::new(App { coordinator });

    Router::new()
        .route("/ns/get_namespaces", get(get_namespaces))
        .route("/ns/{namespace}", get(read_namespace))
        .route(
            "/ns/{namespace}/objects",
            post(create_object).get(list_objects),
        )
        .route("/ns/{namespace}/objects/{object_id}", delete(delete_object))
        .route(
            "/ns/{namespace}/objects/{object_id}/meta",
            get(get_object_meta),
        )
        .route(
            "/ns/{namespace}/objects/{object_id}/body",
            get(get_object_body),
        )
        .route("/ns/{namespace}/search-schema", put(set_search_schema))
        .route("/ns/{namespace}/search", post(search_objects))
        .with_state(app)
}

fn parse_namespace(raw: &str) -> Result<Namespace, Error> {
    Ok(Namespace::new(raw)?)
}

fn parse_id(raw: &str) -> Result<Id, Error> {
    raw.parse()
        .map_err(|_| Error::BadRequest(format!("invalid object id {raw:?}")))
}

#[derive(serde::Deserialize)]
struct CreateParams {
    document_name: String,
}

async fn create_object(
    State(app): State<Arc<App>>,
    Path(namespace): Path<String>,
    Query(params): Query<CreateParams>,
    body: Body,
) -> Result<Json<Id>, Error> {
    let namespace = parse_namespace(&namespace)?;
    let id = app
        .coordinator
        .create_object_stream(&namespace, &params.document_name, body.into_data_stream())
        .await?;
    Ok(Json(id))
}

async fn get_object_meta(
    State(app): State<Arc<App>>,
    Path((namespace, object_id)): Path<(String, String)>,
) -> Result<Json<Document>, Error> {
    let namespace = parse_namespace(&namespace)?;
    let id = parse_id(&object_id)?;
    Ok(Json(app.coordinator.get_object_meta(&namespace, id).await?))
}

async fn get_object_body(
    State(app): State<Arc<App>>,
    Path((namespace, object_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, Error> {
    let namespace = parse_namespace(&namespace)?;
    let id = parse_id(&object_id)?;
    Ok(Json(app.coordinator.get_object_body(&namespace, id).await?))
}

async fn delete_object(
    State(app): State<Arc<App>>,
    Path((namespace, object_id)): Path<(String, String)>,
) -> Result<StatusCode, Error> {
    let namespace = parse_namespace(&namespace)?;
    let id = parse_id(&object_id)?;
    app.coordinator.delete_object(&namespace, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_search_schema(
    State(app): State<Arc<App>>,
    Path(namespace): Path<String>,
    Json(schema): Json<BTreeMap<String, String>>,
) -> Result<StatusCode, Error> {
    let namespace = parse_namespace(&namespace)?;
    app.coordinator.set_search_schema(&namespace, schema).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn search_objects(
    State(app): State<Arc<App>>,
    Path(namespace): Path<String>,
    body: String,
) -> Result<Json<Vec<serde_json::Value>>, Error> {
    let namespace = parse_namespace(&namespace)?;
    // The expression arrives as raw text, or as a JSON string when the
    // client posts with a JSON content type.
    let filters = serde_json::from_str::<String>(&body).unwrap_or(body);
    Ok(Json(
        app.coordinator.search_objects(&namespace, &filters).await?,
    ))
}

async fn read_namespace(
    State(app): State<Arc<App>>,
    Path(namespace): Path<String>,
) -> Result<Json<DocumentList>, Error> {
    let namespace = parse_namespace(&namespace)?;
    Ok(Json(app.coordinator.read_namespace(&namespace).await?))
}

#[derive(serde::Deserialize)]
struct ListParams {
    limit: Option<i64>,
    cursor: Option<String>,
}

fn validate_limit(limit: Option<i64>) -> Result<i64, Error> {
    match limit {
        None => Ok(50),
        Some(limit) if (1..=100).contains(&limit) => Ok(limit),
        Some(limit) => Err(Error::BadRequest(format!(
            "limit must be between 1 and 100, got {limit}"
        ))),
    }
}

async fn list_objects(
    State(app): State<Arc<App>>,
    Path(namespace): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<DocumentList>, Error> {
    let namespace = parse_namespace(&namespace)?;
    let limit = validate_limit(params.limit)?;
    Ok(Json(
        app.coordinator
            .list_objects(&namespace, limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn get_namespaces(State(app): State<Arc<App>>) -> impl IntoResponse {
    Json(app.coordinator.namespaces().await)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn limit_is_bounded_with_a_default() {
        assert_eq!(validate_limit(None).unwrap(), 50);
        assert_eq!(validate_limit(Some(1)).unwrap(), 1);
        assert_eq!(validate_limit(Some(100)).unwrap(), 100);
        assert!(validate_limit(Some(0)).is_err());
        assert!(validate_limit(Some(101)).is_err());
        assert!(validate_limit(Some(-5)).is_err());
    }

    #[test]
    fn hostile_namespaces_are_rejected_before_any_sql() {
        assert!(matches!(
            parse_namespace("drop table; --"),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn object_ids_must_be_uuids() {
        assert!(parse_id("0190f1a2-7c13-7000-8000-000000000000").is_ok());
        assert!(matches!(parse_id("42"), Err(Error::BadRequest(_))));
    }
}
