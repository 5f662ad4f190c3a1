//! HTTP routes for the user administration service

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::AppState;
use crate::models::{Role, User};
use crate::security::Principal;
use crate::service::ServiceError;
use crate::validation::{validate_email, validate_password};

/// Request for user creation
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub age: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Request for user update.
///
/// An empty or missing password keeps the stored one.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub age: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// User view returned by the API; the password hash never leaves the service
#[derive(Serialize)]
pub struct UserResponse {
    pub id: Option<i64>,
    pub email: String,
    pub age: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub roles: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            age: user.age,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            roles: user.role_names(),
        }
    }
}

/// Request for user login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Response for user login
#[derive(Serialize)]
pub struct LoginResponse {
    pub username: String,
    pub authorities: Vec<String>,
}

/// Query parameters for listing users
#[derive(Deserialize)]
pub struct ListParams {
    pub count: Option<usize>,
}

/// Create the router for the user administration service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/auth/login", post(login))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "users-service"
    }))
}

/// List users, optionally truncated to the first `count`
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let users = match params.count {
        Some(count) => state.user_service.list(count).await?,
        None => state.user_service.list_all().await?,
    };

    let body: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(body))
}

/// Fetch a single user by id
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    match state.user_service.find(id).await? {
        Some(user) => Ok(Json(UserResponse::from(user))),
        None => Err(ApiError::NotFound),
    }
}

/// Create a user
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Creating user: {}", payload.email);

    validate_email(&payload.email).map_err(ApiError::BadRequest)?;
    validate_password(&payload.password).map_err(ApiError::BadRequest)?;

    let mut user = User::with_profile(
        payload.email,
        payload.password,
        payload.age,
        payload.first_name,
        payload.last_name,
    );
    user.set_roles(payload.roles.into_iter().map(Role::new));

    let created = state.user_service.create(user).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// Overwrite a user
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Updating user: {}", id);

    validate_email(&payload.email).map_err(ApiError::BadRequest)?;

    let mut patch = User::with_profile(
        payload.email,
        payload.password,
        payload.age,
        payload.first_name,
        payload.last_name,
    );
    patch.set_roles(payload.roles.into_iter().map(Role::new));

    match state.user_service.update(id, Some(patch)).await? {
        Some(updated) => Ok(Json(UserResponse::from(updated))),
        None => Err(ApiError::NotFound),
    }
}

/// Delete a user; a missing id is not an error
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.user_service.delete_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Username/password login check
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Login attempt for user: {}", payload.username);

    let user = state
        .user_service
        .load_user_by_username(&payload.username)
        .await
        .map_err(|e| match e {
            ServiceError::UsernameNotFound(_) => ApiError::Unauthorized,
            ServiceError::Storage(e) => ApiError::Internal(e),
        })?;

    let matches = state
        .password_encoder
        .verify(&payload.password, user.password())?;
    if !matches {
        return Err(ApiError::Unauthorized);
    }

    let response = LoginResponse {
        username: user.username().to_string(),
        authorities: user.authorities(),
    };
    Ok(Json(response))
}

/// Custom error type for the user administration API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unauthorized access
    #[error("Unauthorized")]
    Unauthorized,

    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Requested entity does not exist
    #[error("Not found")]
    NotFound,

    /// Internal server error
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::UsernameNotFound(_) => ApiError::NotFound,
            ServiceError::Storage(e) => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
