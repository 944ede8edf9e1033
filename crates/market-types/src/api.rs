//! API types for the marketplace HTTP API.
//!
//! Request bodies keep their fields optional where the handler reports a
//! missing field itself, so clients get the same JSON error shape for every
//! failure.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CartLine, OrderStatus, UserRole};

/// Request for creating a directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
	pub user_type: Option<String>,
}

/// Response for a created directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserResponse {
	pub message: String,
	pub user_id: String,
}

/// Response describing a single directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
	pub user_id: String,
	pub user_type: UserRole,
}

/// Response listing the whole directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
	pub users: Vec<UserResponse>,
}

/// Response for catalog mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
	pub message: String,
	pub product_id: String,
}

/// Request for adding a product to a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddToCartRequest {
	pub product_id: Option<String>,
	pub quantity: Option<u32>,
}

/// Request for removing a line from a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveFromCartRequest {
	/// Product id of the line to drop.
	pub item_id: Option<String>,
}

/// Response carrying a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	pub cart: Vec<CartLine>,
}

/// Generic acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
	pub message: String,
}

/// Response for a placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
	pub message: String,
	pub order_id: String,
}

/// Request for a store owner's review of a pending order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOrderRequest {
	pub store_owner_id: Option<String>,
	pub decision: Option<String>,
}

/// Response for a completed review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOrderResponse {
	pub message: String,
	pub order_id: String,
	pub status: OrderStatus,
	pub total_quantity: u64,
}

/// Request body for rider transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderRequest {
	pub rider_id: Option<String>,
}

/// Response for rider transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderActionResponse {
	pub message: String,
	pub order_id: String,
	pub status: OrderStatus,
}

/// An accepted order waiting for a rider, priced at current catalog prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliverableOrder {
	pub order_id: String,
	pub store_owner_id: String,
	pub items: Vec<CartLine>,
	pub total_quantity: u64,
	pub total_price: Decimal,
	pub status: OrderStatus,
}

/// An order line joined with its current unit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricedLine {
	pub product_id: String,
	pub quantity: u32,
	pub price: Decimal,
}

/// An order as shown to its customer or rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
	pub order_id: String,
	pub user_id: String,
	pub status: OrderStatus,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rider_id: Option<String>,
	pub items: Vec<PricedLine>,
	pub total_price: Decimal,
}

/// API error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Error type/code
	pub error: String,
	/// Human-readable description
	pub message: String,
	/// Additional error context
	pub details: Option<serde_json::Value>,
	/// Suggested retry delay in seconds
	#[serde(rename = "retryAfter")]
	pub retry_after: Option<u64>,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input, failed domain check or illegal state transition (400)
	BadRequest {
		error_type: String,
		message: String,
		details: Option<serde_json::Value>,
	},
	/// Caller lacks the role required for the action (403)
	Forbidden { error_type: String, message: String },
	/// Referenced user, product, cart or order does not exist (404)
	NotFound { error_type: String, message: String },
	/// A concurrent request changed the record first (409)
	Conflict {
		error_type: String,
		message: String,
		retry_after: Option<u64>,
	},
	/// Internal server error (500)
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> u16 {
		match self {
			APIError::BadRequest { .. } => 400,
			APIError::Forbidden { .. } => 403,
			APIError::NotFound { .. } => 404,
			APIError::Conflict { .. } => 409,
			APIError::InternalServerError { .. } => 500,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error, message, details, retry_after) = match self {
			APIError::BadRequest {
				error_type,
				message,
				details,
			} => (error_type, message, details.clone(), None),
			APIError::Forbidden { error_type, message }
			| APIError::NotFound { error_type, message }
			| APIError::InternalServerError { error_type, message } => {
				(error_type, message, None, None)
			},
			APIError::Conflict {
				error_type,
				message,
				retry_after,
			} => (error_type, message, None, *retry_after),
		};
		ErrorResponse {
			error: error.clone(),
			message: message.clone(),
			details,
			retry_after,
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::Conflict { message, .. } => write!(f, "Conflict: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		use axum::{http::StatusCode, response::Json};

		let status = StatusCode::from_u16(self.status_code())
			.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
		(status, Json(self.to_error_response())).into_response()
	}
}
