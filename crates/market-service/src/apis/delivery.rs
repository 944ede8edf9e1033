//! Rider endpoints.

use super::{json_body, required, to_api_error};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use market_types::{APIError, DeliverableOrder, OrderActionResponse, OrderView, RiderRequest};

/// Handles GET /api/orders/available_for_riders requests.
pub async fn available_for_riders(
	State(state): State<AppState>,
) -> Result<Json<Vec<DeliverableOrder>>, APIError> {
	state
		.engine
		.list_deliverable_orders()
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles POST /api/orders/{order_id}/accept requests.
pub async fn accept_for_delivery(
	Path(order_id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<RiderRequest>, JsonRejection>,
) -> Result<Json<OrderActionResponse>, APIError> {
	let rider_id = required(json_body(payload)?.rider_id, "rider_id")?;
	let order = state
		.engine
		.accept_for_delivery(&order_id, &rider_id)
		.await
		.map_err(to_api_error)?;
	Ok(Json(OrderActionResponse {
		message: "Order accepted for delivery".into(),
		order_id: order.order_id,
		status: order.status,
	}))
}

/// Handles POST /api/orders/{order_id}/deliver requests.
pub async fn mark_delivered(
	Path(order_id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<RiderRequest>, JsonRejection>,
) -> Result<Json<OrderActionResponse>, APIError> {
	let rider_id = required(json_body(payload)?.rider_id, "rider_id")?;
	let order = state
		.engine
		.mark_delivered(&order_id, &rider_id)
		.await
		.map_err(to_api_error)?;
	Ok(Json(OrderActionResponse {
		message: "Order marked as delivered".into(),
		order_id: order.order_id,
		status: order.status,
	}))
}

/// Handles GET /api/rider/{rider_id}/orders requests.
pub async fn rider_orders(
	Path(rider_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Vec<OrderView>>, APIError> {
	state
		.engine
		.rider_orders(&rider_id)
		.await
		.map(Json)
		.map_err(to_api_error)
}
