//! Order state machine implementation.
//!
//! Orders move through `pending -> accepted -> on_the_way -> delivered`, or
//! `pending -> rejected`. Rejected and delivered are terminal. The accepted
//! order mirror follows the same table so both records always agree.

use crate::MarketError;
use market_storage::{StorageService, Versioned};
use market_types::{current_timestamp, AcceptedOrder, Order, OrderStatus, StorageKey};
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during order state management.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error("Invalid state transition of order {order_id} from {from} to {to}")]
	InvalidTransition {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
	},
}

impl From<OrderStateError> for MarketError {
	fn from(err: OrderStateError) -> Self {
		match err {
			OrderStateError::InvalidTransition { order_id, from, .. } => MarketError::InvalidState {
				order_id,
				status: from,
			},
		}
	}
}

// Static transition table - each state maps to allowed next states
static TRANSITIONS: Lazy<HashMap<OrderStatus, HashSet<OrderStatus>>> = Lazy::new(|| {
	HashMap::from([
		(
			OrderStatus::Pending,
			HashSet::from([OrderStatus::Accepted, OrderStatus::Rejected]),
		),
		(OrderStatus::Accepted, HashSet::from([OrderStatus::OnTheWay])),
		(OrderStatus::OnTheWay, HashSet::from([OrderStatus::Delivered])),
		(OrderStatus::Rejected, HashSet::new()),
		(OrderStatus::Delivered, HashSet::new()),
	])
});

/// Loads order records and validates their status transitions.
///
/// Transitions only mutate the in-memory record; callers persist them in a
/// guarded transaction on the revision the record was loaded at.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Checks if a state transition is valid
	pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}

	fn check(order_id: &str, from: OrderStatus, to: OrderStatus) -> Result<(), OrderStateError> {
		if Self::is_valid_transition(from, to) {
			Ok(())
		} else {
			Err(OrderStateError::InvalidTransition {
				order_id: order_id.to_string(),
				from,
				to,
			})
		}
	}

	/// Moves an order to `to`, stamping `updated_at`.
	pub fn transition(&self, order: &mut Order, to: OrderStatus) -> Result<(), OrderStateError> {
		Self::check(&order.order_id, order.status, to)?;
		order.status = to;
		order.updated_at = current_timestamp();
		Ok(())
	}

	/// Moves an accepted-order mirror to `to`.
	pub fn transition_mirror(
		&self,
		mirror: &mut AcceptedOrder,
		to: OrderStatus,
	) -> Result<(), OrderStateError> {
		Self::check(&mirror.order_id, mirror.status, to)?;
		mirror.status = to;
		Ok(())
	}

	/// Gets an order by ID
	pub async fn load_order(&self, order_id: &str) -> Result<Versioned<Order>, MarketError> {
		let (order, revision) = self
			.storage
			.load_optional::<Order>(StorageKey::Orders.as_str(), order_id)
			.await?;
		order
			.map(|value| Versioned { value, revision })
			.ok_or_else(|| MarketError::OrderNotFound(order_id.to_string()))
	}

	/// Gets the accepted-order mirror of an order.
	pub async fn load_mirror(
		&self,
		order_id: &str,
	) -> Result<Versioned<AcceptedOrder>, MarketError> {
		let (mirror, revision) = self
			.storage
			.load_optional::<AcceptedOrder>(StorageKey::AcceptedOrders.as_str(), order_id)
			.await?;
		mirror
			.map(|value| Versioned { value, revision })
			.ok_or_else(|| MarketError::OrderNotFound(order_id.to_string()))
	}
}
