//! Cart endpoints.

use super::{json_body, required, to_api_error};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use market_types::{APIError, AddToCartRequest, CartResponse, RemoveFromCartRequest};

/// Handles POST /api/cart/{user_id}/add_product requests.
pub async fn add_to_cart(
	Path(user_id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CartResponse>), APIError> {
	let request = json_body(payload)?;
	let product_id = required(request.product_id, "product_id")?;
	let quantity = required(request.quantity, "quantity")?;

	let update = state
		.engine
		.add_to_cart(&user_id, &product_id, quantity)
		.await
		.map_err(to_api_error)?;

	let message = if update.merged {
		format!("Product {} quantity updated in cart.", product_id)
	} else {
		format!("Product {} added to cart.", product_id)
	};
	Ok((
		StatusCode::CREATED,
		Json(CartResponse {
			message: Some(message),
			cart: update.cart.items,
		}),
	))
}

/// Handles GET /api/cart/{user_id} requests.
pub async fn get_cart(
	Path(user_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<CartResponse>, APIError> {
	let cart = state.engine.get_cart(&user_id).await.map_err(to_api_error)?;
	Ok(Json(CartResponse {
		message: None,
		cart: cart.items,
	}))
}

/// Handles DELETE /api/cart/{user_id} requests.
///
/// `item_id` names the product whose line is dropped.
pub async fn remove_from_cart(
	Path(user_id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<RemoveFromCartRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, APIError> {
	let request = json_body(payload)?;
	let item_id = required(request.item_id, "item_id")?;

	let cart = state
		.engine
		.remove_from_cart(&user_id, &item_id)
		.await
		.map_err(to_api_error)?;
	Ok(Json(CartResponse {
		message: Some("Item removed from cart successfully".into()),
		cart: cart.items,
	}))
}
