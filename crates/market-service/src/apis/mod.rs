//! HTTP handlers for the marketplace API.
//!
//! Every handler returns either its JSON payload or an [`APIError`], so all
//! failures share one response shape.

pub mod cart;
pub mod delivery;
pub mod orders;
pub mod products;
pub mod users;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use market_core::MarketError;
use market_types::APIError;

/// Maps an engine error onto its HTTP error and machine-readable code.
pub fn to_api_error(err: MarketError) -> APIError {
	let message = err.to_string();
	match err {
		MarketError::Storage(_) => {
			tracing::error!(error = %message, "Storage failure");
			APIError::InternalServerError {
				error_type: "STORAGE_ERROR".into(),
				message,
			}
		},
		MarketError::Conflict(_) => APIError::Conflict {
			error_type: "CONFLICT".into(),
			message,
			retry_after: Some(1),
		},
		MarketError::Unauthorized(_) => APIError::Forbidden {
			error_type: "UNAUTHORIZED".into(),
			message,
		},
		MarketError::UserNotFound(_) => not_found("USER_NOT_FOUND", message),
		MarketError::ProductNotFound(_) => not_found("PRODUCT_NOT_FOUND", message),
		MarketError::OrderNotFound(_) => not_found("ORDER_NOT_FOUND", message),
		MarketError::CartNotFound(_) => not_found("CART_NOT_FOUND", message),
		MarketError::NoResults(_) => not_found("NOT_FOUND", message),
		MarketError::InsufficientStock {
			ref product_id,
			requested,
			available,
		} => {
			let shortfall = requested.saturating_sub(available);
			APIError::BadRequest {
				error_type: "INSUFFICIENT_STOCK".into(),
				details: Some(serde_json::json!({
					"product_id": product_id,
					"requested": requested,
					"available": available,
					"shortfall": shortfall,
				})),
				message,
			}
		},
		MarketError::InvalidState {
			ref order_id,
			status,
		} => APIError::BadRequest {
			error_type: "INVALID_STATE".into(),
			details: Some(serde_json::json!({
				"order_id": order_id,
				"status": status,
			})),
			message,
		},
		MarketError::EmptyCart(_) => bad_request("EMPTY_CART", message),
		MarketError::EmptyOrder(_) => bad_request("EMPTY_ORDER", message),
		MarketError::NotAssigned { .. } => bad_request("NOT_ASSIGNED", message),
		MarketError::InvalidInput(_) => bad_request("INVALID_INPUT", message),
	}
}

fn not_found(code: &str, message: String) -> APIError {
	APIError::NotFound {
		error_type: code.into(),
		message,
	}
}

fn bad_request(code: &str, message: String) -> APIError {
	APIError::BadRequest {
		error_type: code.into(),
		message,
		details: None,
	}
}

/// Unwraps a JSON body, reporting malformed bodies in the API error shape.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, APIError> {
	payload
		.map(|Json(body)| body)
		.map_err(|rejection| bad_request("INVALID_REQUEST", rejection.body_text()))
}

/// Unwraps a field the handler requires.
pub fn required<T>(value: Option<T>, field: &str) -> Result<T, APIError> {
	value.ok_or_else(|| bad_request("INVALID_INPUT", format!("Missing required field: {}", field)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use market_types::OrderStatus;

	#[test]
	fn test_status_mapping() {
		let cases = [
			(MarketError::UserNotFound("u".into()), 404),
			(MarketError::NoResults("none".into()), 404),
			(MarketError::EmptyCart("u".into()), 400),
			(MarketError::EmptyOrder("o".into()), 400),
			(
				MarketError::NotAssigned {
					order_id: "o".into(),
					rider_id: "r".into(),
				},
				400,
			),
			(MarketError::Unauthorized("r".into()), 403),
			(MarketError::Conflict("orders:o".into()), 409),
			(MarketError::Storage("io".into()), 500),
		];
		for (err, status) in cases {
			assert_eq!(to_api_error(err).status_code(), status);
		}
	}

	#[test]
	fn test_insufficient_stock_details() {
		let api = to_api_error(MarketError::InsufficientStock {
			product_id: "p1".into(),
			requested: 3,
			available: 2,
		});
		let body = api.to_error_response();
		assert_eq!(body.error, "INSUFFICIENT_STOCK");
		let details = body.details.unwrap();
		assert_eq!(details["shortfall"], 1);
		assert_eq!(details["available"], 2);
	}

	#[test]
	fn test_invalid_state_details() {
		let api = to_api_error(MarketError::InvalidState {
			order_id: "o1".into(),
			status: OrderStatus::OnTheWay,
		});
		assert_eq!(api.status_code(), 400);
		assert_eq!(
			api.to_error_response().details.unwrap()["status"],
			"on_the_way"
		);
	}

	#[test]
	fn test_required_field() {
		assert_eq!(required(Some(1), "quantity").unwrap(), 1);
		let err = required::<u32>(None, "quantity").unwrap_err();
		assert!(err.to_string().contains("quantity"));
	}
}
