//! Error type shared by every marketplace operation.

use market_storage::StorageError;
use market_types::OrderStatus;
use thiserror::Error;

/// Errors returned by catalog, directory, cart and order operations.
///
/// Each variant corresponds to one failure a caller can act on; the API layer
/// maps them onto HTTP statuses without inspecting messages.
#[derive(Debug, Error)]
pub enum MarketError {
	#[error("User not found: {0}")]
	UserNotFound(String),
	#[error("Product not found: {0}")]
	ProductNotFound(String),
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	#[error("Cart not found for user {0}")]
	CartNotFound(String),
	/// A listing query matched nothing.
	#[error("{0}")]
	NoResults(String),
	#[error("Cart is empty for user {0}")]
	EmptyCart(String),
	#[error("Invalid input: {0}")]
	InvalidInput(String),
	#[error("Unauthorized: {0}")]
	Unauthorized(String),
	#[error("Order {order_id} is {status}")]
	InvalidState {
		order_id: String,
		status: OrderStatus,
	},
	#[error("Order {order_id} is not assigned to rider {rider_id}")]
	NotAssigned { order_id: String, rider_id: String },
	#[error("Order {0} has no items")]
	EmptyOrder(String),
	#[error(
		"Not enough stock for product {product_id}: requested {requested}, available {available}"
	)]
	InsufficientStock {
		product_id: String,
		requested: u64,
		available: u64,
	},
	/// A record changed between read and write; nothing was applied.
	#[error("Concurrent modification of {0}")]
	Conflict(String),
	#[error("Storage error: {0}")]
	Storage(String),
}

impl MarketError {
	/// Units missing to satisfy a reservation, if this is a stock failure.
	pub fn shortfall(&self) -> Option<u64> {
		match self {
			MarketError::InsufficientStock {
				requested,
				available,
				..
			} => Some(requested.saturating_sub(*available)),
			_ => None,
		}
	}
}

impl From<StorageError> for MarketError {
	fn from(err: StorageError) -> Self {
		match err {
			StorageError::Conflict(key) => MarketError::Conflict(key),
			other => MarketError::Storage(other.to_string()),
		}
	}
}
