//! Checkout and review endpoints.

use super::{json_body, required, to_api_error};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use market_types::{
	APIError, CreateOrderResponse, Order, ReviewOrderRequest, ReviewOrderResponse,
};

/// Handles POST /api/order/{user_id} requests.
pub async fn create_order(
	Path(user_id): Path<String>,
	State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), APIError> {
	let order = state
		.engine
		.create_order(&user_id)
		.await
		.map_err(to_api_error)?;
	Ok((
		StatusCode::CREATED,
		Json(CreateOrderResponse {
			message: "Order placed successfully".into(),
			order_id: order.order_id,
		}),
	))
}

/// Handles GET /api/order/{user_id} requests.
pub async fn user_orders(
	Path(user_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<Order>>, APIError> {
	state
		.engine
		.user_orders(&user_id)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles POST /api/order/{order_id}/review requests.
pub async fn review_order(
	Path(order_id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<ReviewOrderRequest>, JsonRejection>,
) -> Result<Json<ReviewOrderResponse>, APIError> {
	let request = json_body(payload)?;
	let store_owner_id = required(request.store_owner_id, "store_owner_id")?;
	let decision = required(request.decision, "decision")?;

	let outcome = state
		.engine
		.review_order(&order_id, &store_owner_id, &decision)
		.await
		.map_err(to_api_error)?;
	Ok(Json(ReviewOrderResponse {
		message: format!(
			"Order {} successfully. Total items: {}",
			outcome.order.status, outcome.total_quantity
		),
		order_id: outcome.order.order_id,
		status: outcome.order.status,
		total_quantity: outcome.total_quantity,
	}))
}
