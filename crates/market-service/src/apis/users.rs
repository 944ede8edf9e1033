//! Directory endpoints.

use super::{json_body, required, to_api_error};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use market_types::{
	APIError, CreateUserRequest, CreateUserResponse, User, UserResponse, UsersResponse,
};

fn user_response(user: User) -> UserResponse {
	UserResponse {
		user_id: user.user_id,
		user_type: user.user_type,
	}
}

/// Handles POST /api/users requests.
pub async fn create_user(
	State(state): State<AppState>,
	payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateUserResponse>), APIError> {
	let request = json_body(payload)?;
	let user_type = required(request.user_type, "user_type")?;

	let user = state
		.engine
		.create_user(&user_type)
		.await
		.map_err(to_api_error)?;
	Ok((
		StatusCode::CREATED,
		Json(CreateUserResponse {
			message: "User created successfully".into(),
			user_id: user.user_id,
		}),
	))
}

/// Handles GET /api/users/{id} requests.
pub async fn get_user(
	Path(user_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<UserResponse>, APIError> {
	let user = state.engine.get_user(&user_id).await.map_err(to_api_error)?;
	Ok(Json(user_response(user)))
}

/// Handles GET /api/users requests.
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UsersResponse>, APIError> {
	let users = state.engine.list_users().await.map_err(to_api_error)?;
	Ok(Json(UsersResponse {
		users: users.into_iter().map(user_response).collect(),
	}))
}
