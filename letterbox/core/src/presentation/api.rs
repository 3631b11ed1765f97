// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP API
//!
//! JSON routes over the application services. The acting user is named by
//! the `X-User-Id` header on every call except registration and health;
//! authenticating that header is the job of whatever sits in front.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;
use crate::application::error::ServiceError;
use crate::application::repository_factory::LetterboxServices;
use crate::domain::connection::ConnectionId;
use crate::domain::letter::LetterId;
use crate::domain::modification::ModificationId;
use crate::domain::user::UserId;

pub const ACTING_USER_HEADER: &str = "x-user-id";

pub struct AppState {
    pub services: LetterboxServices,
}

pub fn app(services: LetterboxServices) -> Router {
    let state = Arc::new(AppState { services });

    Router::new()
        .route("/health", get(health))
        .route("/users", post(register_user))
        .route("/users/search", get(search_users))
        .route("/users/{id}", get(get_user))
        .route("/connections", post(request_connection))
        .route("/connections/{id}/accept", post(accept_connection))
        .route("/connections/pending", get(pending_connections))
        .route("/connections/accepted", get(accepted_connections))
        .route("/letters", post(create_letter).get(list_letters))
        .route("/letters/{id}", get(get_letter))
        .route("/letters/{id}/current", get(current_content))
        .route("/letters/{id}/modifications", post(propose_modification))
        .route("/threads/{user_id}", get(thread_with))
        .route("/modifications", get(list_modifications))
        .route("/modifications/awaiting-approval", get(awaiting_approval))
        .route("/modifications/{id}/approve", post(approve_modification))
        .route("/modifications/{id}/reject", post(reject_modification))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Errors surfaced to HTTP callers.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Service(err) => {
                let status = match &err {
                    ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                    ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                    ServiceError::InvalidState(_) | ServiceError::Conflict(_) => StatusCode::CONFLICT,
                    ServiceError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
                    ServiceError::InvariantViolation(_) | ServiceError::Repository(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if err.is_user_actionable() {
                    (status, err.to_string())
                } else {
                    error!(error = %err, "Request failed");
                    (status, "internal server error".to_string())
                }
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// User named by the `X-User-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub UserId);

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTING_USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".to_string()))?;
        let raw = value
            .to_str()
            .map_err(|_| ApiError::Unauthorized("malformed X-User-Id header".to_string()))?;
        UserId::from_string(raw.trim())
            .map(ActingUser)
            .map_err(|_| ApiError::Unauthorized("malformed X-User-Id header".to_string()))
    }
}

fn parse_id<T>(raw: &str, kind: &str, parse: fn(&str) -> Result<T, uuid::Error>) -> ApiResult<T> {
    parse(raw).map_err(|_| ApiError::BadRequest(format!("invalid {} id '{}'", kind, raw)))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

#[derive(Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
}

async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let user = state.services.users.register(&payload.username).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let users = state.services.users.search(&params.q, Some(user)).await?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    ActingUser(_): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "user", UserId::from_string)?;
    Ok(Json(state.services.users.find(id).await?))
}

#[derive(Deserialize)]
pub struct ConnectionRequest {
    pub receiver_id: String,
}

async fn request_connection(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Json(payload): Json<ConnectionRequest>,
) -> ApiResult<impl IntoResponse> {
    let receiver = parse_id(&payload.receiver_id, "user", UserId::from_string)?;
    let connection = state.services.connections.request_connection(user, receiver).await?;
    Ok((StatusCode::CREATED, Json(connection)))
}

async fn accept_connection(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "connection", ConnectionId::from_string)?;
    let connection = state.services.connections.accept_connection(id, user).await?;
    Ok(Json(connection))
}

async fn pending_connections(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.connections.pending_connections_for(user).await?))
}

async fn accepted_connections(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.connections.accepted_connections_for(user).await?))
}

#[derive(Deserialize)]
pub struct CreateLetterRequest {
    pub receiver_id: String,
    pub content: String,
}

async fn create_letter(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Json(payload): Json<CreateLetterRequest>,
) -> ApiResult<impl IntoResponse> {
    let receiver = parse_id(&payload.receiver_id, "user", UserId::from_string)?;
    let letter = state
        .services
        .letters
        .create_letter(user, receiver, &payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(letter)))
}

async fn list_letters(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.letters.letters_for(user).await?))
}

async fn get_letter(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "letter", LetterId::from_string)?;
    Ok(Json(state.services.letters.letter_for(id, user).await?))
}

async fn current_content(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "letter", LetterId::from_string)?;
    // Participation check before revealing content
    state.services.letters.letter_for(id, user).await?;
    Ok(Json(state.services.letters.current_content(id).await?))
}

async fn thread_with(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(other): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let other = parse_id(&other, "user", UserId::from_string)?;
    Ok(Json(state.services.letters.list_thread(user, other).await?))
}

#[derive(Deserialize)]
pub struct ProposeModificationRequest {
    pub proposed_content: String,
}

async fn propose_modification(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
    Json(payload): Json<ProposeModificationRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "letter", LetterId::from_string)?;
    let request = state
        .services
        .modifications
        .propose(id, user, &payload.proposed_content)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_modifications(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.services.modifications.modifications_visible_to(user).await?))
}

async fn awaiting_approval(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .services
            .modifications
            .pending_modifications_awaiting_approval_by(user)
            .await?,
    ))
}

async fn approve_modification(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "modification", ModificationId::from_string)?;
    Ok(Json(state.services.modifications.approve(id, user).await?))
}

async fn reject_modification(
    State(state): State<Arc<AppState>>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id, "modification", ModificationId::from_string)?;
    Ok(Json(state.services.modifications.reject(id, user).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repository_factory::LetterboxRepositories;
    use crate::domain::repository::RepositoryError;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> (Router, LetterboxServices) {
        let services = LetterboxServices::new(LetterboxRepositories::in_memory());
        (app(services.clone()), services)
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, user: Option<UserId>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(ACTING_USER_HEADER, user.to_string());
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_as(uri: &str, user: UserId) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(ACTING_USER_HEADER, user.to_string())
            .body(Body::empty())
            .unwrap()
    }

    async fn connected_pair(services: &LetterboxServices) -> (UserId, UserId) {
        let alice = services.users.register("alice").await.unwrap().id;
        let bob = services.users.register("bob").await.unwrap().id;
        let conn = services.connections.request_connection(alice, bob).await.unwrap();
        services.connections.accept_connection(conn.id, bob).await.unwrap();
        (alice, bob)
    }

    #[tokio::test]
    async fn test_health() {
        let (router, _) = router();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_missing_or_malformed_acting_user_is_unauthorized() {
        let (router, _) = router();
        let request = Request::builder().uri("/letters").body(Body::empty()).unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/letters")
            .header(ACTING_USER_HEADER, "not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&router, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_path_id_is_bad_request() {
        let (router, services) = router();
        let (alice, _) = connected_pair(&services).await;
        let (status, body) = send(&router, get_as("/letters/nope", alice)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("letter"));
    }

    #[tokio::test]
    async fn test_register_then_duplicate_conflicts() {
        let (router, _) = router();
        let (status, body) = send(&router, post_json("/users", None, json!({"username": "alice"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["username"], "alice");

        let (status, _) = send(&router, post_json("/users", None, json!({"username": "alice"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let (router, services) = router();
        let (alice, bob) = connected_pair(&services).await;

        let (status, body) = send(&router, get_as(&format!("/users/{}", bob), alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "bob");

        let (status, _) = send(&router, get_as(&format!("/users/{}", UserId::new()), alice)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // Static segment still wins over the id capture
        let (status, found) = send(&router, get_as("/users/search?q=bo", alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_letter_to_unconnected_user_is_forbidden() {
        let (router, services) = router();
        let alice = services.users.register("alice").await.unwrap().id;
        let carol = services.users.register("carol").await.unwrap().id;

        let (status, _) = send(
            &router,
            post_json(
                "/letters",
                Some(alice),
                json!({"receiver_id": carol.to_string(), "content": "hi"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_modification_round_trip_over_http() {
        let (router, services) = router();
        let (alice, bob) = connected_pair(&services).await;

        let (status, letter) = send(
            &router,
            post_json(
                "/letters",
                Some(alice),
                json!({"receiver_id": bob.to_string(), "content": "hello"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let letter_id = letter["letter"]["id"].as_str().unwrap().to_string();

        let (status, modification) = send(
            &router,
            post_json(
                &format!("/letters/{}/modifications", letter_id),
                Some(bob),
                json!({"proposed_content": "hello there"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(modification["status"], "PENDING");
        let modification_id = modification["id"].as_str().unwrap().to_string();

        let (status, awaiting) = send(&router, get_as("/modifications/awaiting-approval", alice)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(awaiting.as_array().unwrap().len(), 1);

        // Bob proposed it but cannot approve it
        let approve_uri = format!("/modifications/{}/approve", modification_id);
        let (status, _) = send(&router, post_json(&approve_uri, Some(bob), json!({}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, approved) = send(&router, post_json(&approve_uri, Some(alice), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(approved["version"]["created_by"], bob.to_string());

        let (status, _) = send(&router, post_json(&approve_uri, Some(alice), json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, current) = send(&router, get_as(&format!("/letters/{}/current", letter_id), bob)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(current["content"], "hello there");
    }

    #[tokio::test]
    async fn test_current_content_hidden_from_outsiders() {
        let (router, services) = router();
        let (alice, bob) = connected_pair(&services).await;
        let outsider = services.users.register("mallory").await.unwrap().id;
        let letter = services.letters.create_letter(alice, bob, "secret").await.unwrap();

        let uri = format!("/letters/{}/current", letter.letter.id);
        let (status, _) = send(&router, get_as(&uri, outsider)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_internal_errors_use_generic_body() {
        let err = ApiError::Service(ServiceError::Repository(RepositoryError::Database(
            "connection refused to 10.0.0.5".to_string(),
        )));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
