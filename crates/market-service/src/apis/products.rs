//! Catalog management endpoints.

use super::{json_body, to_api_error};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use market_core::AddOutcome;
use market_types::{
	APIError, MessageResponse, NewProduct, Product, ProductPatch, ProductResponse,
};

/// Handles POST /api/products requests.
///
/// Adding a listing identical to an existing one restocks it and answers 200
/// instead of 201.
pub async fn add_product(
	State(state): State<AppState>,
	payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), APIError> {
	let product = json_body(payload)?;
	let outcome = state
		.engine
		.add_product(product)
		.await
		.map_err(to_api_error)?;

	let (status, message) = match &outcome {
		AddOutcome::Created(_) => (StatusCode::CREATED, "Product added successfully"),
		AddOutcome::Restocked(_) => (StatusCode::OK, "Product quantity updated"),
	};
	Ok((
		status,
		Json(ProductResponse {
			message: message.into(),
			product_id: outcome.product().id.clone(),
		}),
	))
}

/// Handles GET /api/products/{id} requests.
pub async fn get_product(
	Path(product_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Product>, APIError> {
	state
		.engine
		.get_product(&product_id)
		.await
		.map(Json)
		.map_err(to_api_error)
}

/// Handles PUT /api/products/{id} requests.
pub async fn update_product(
	Path(product_id): Path<String>,
	State(state): State<AppState>,
	payload: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<ProductResponse>, APIError> {
	let patch = json_body(payload)?;
	let product = state
		.engine
		.update_product(&product_id, patch)
		.await
		.map_err(to_api_error)?;
	Ok(Json(ProductResponse {
		message: "Product updated successfully".into(),
		product_id: product.id,
	}))
}

/// Handles DELETE /api/products/{id} requests.
pub async fn delete_product(
	Path(product_id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<MessageResponse>, APIError> {
	state
		.engine
		.delete_product(&product_id)
		.await
		.map_err(to_api_error)?;
	Ok(Json(MessageResponse {
		message: "Product deleted successfully".into(),
	}))
}
