//! Cart and order types.
//!
//! An order is created once from a non-empty cart and keeps a frozen copy of
//! its lines. Once a store owner accepts it, an [`AcceptedOrder`] mirror is
//! written next to it and carries the delivery workflow for riders.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::UserRole;

/// A single cart line. Quantities are always positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
	pub product_id: String,
	pub quantity: u32,
}

/// A user's cart: lines unique by product id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
	pub items: Vec<CartLine>,
}

impl Cart {
	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}

	/// Adds `quantity` of a product, merging into an existing line.
	///
	/// Returns `Some(true)` when an existing line was updated, or `None`
	/// without touching the cart if the merged quantity would not fit a `u32`.
	pub fn add(&mut self, product_id: &str, quantity: u32) -> Option<bool> {
		match self.items.iter_mut().find(|l| l.product_id == product_id) {
			Some(line) => {
				line.quantity = line.quantity.checked_add(quantity)?;
				Some(true)
			},
			None => {
				self.items.push(CartLine {
					product_id: product_id.to_string(),
					quantity,
				});
				Some(false)
			},
		}
	}

	/// Drops the line for `product_id`. Returns true if a line was removed.
	pub fn remove(&mut self, product_id: &str) -> bool {
		let before = self.items.len();
		self.items.retain(|l| l.product_id != product_id);
		self.items.len() != before
	}
}

/// Sum of line quantities.
pub fn total_quantity(items: &[CartLine]) -> u64 {
	items.iter().map(|l| u64::from(l.quantity)).sum()
}

/// Order lifecycle status.
///
/// `pending → {accepted, rejected}`, `accepted → on_the_way → delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
	Pending,
	Accepted,
	Rejected,
	OnTheWay,
	Delivered,
}

impl OrderStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			OrderStatus::Pending => "pending",
			OrderStatus::Accepted => "accepted",
			OrderStatus::Rejected => "rejected",
			OrderStatus::OnTheWay => "on_the_way",
			OrderStatus::Delivered => "delivered",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, OrderStatus::Rejected | OrderStatus::Delivered)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A store owner's verdict on a pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
	Accept,
	Reject,
}

impl ReviewDecision {
	/// Status the order moves to under this decision.
	pub fn target_status(&self) -> OrderStatus {
		match self {
			ReviewDecision::Accept => OrderStatus::Accepted,
			ReviewDecision::Reject => OrderStatus::Rejected,
		}
	}
}

impl FromStr for ReviewDecision {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"accept" => Ok(Self::Accept),
			"reject" => Ok(Self::Reject),
			_ => Err("Invalid decision. Choose 'accept' or 'reject'.".into()),
		}
	}
}

/// Primary order record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	pub order_id: String,
	pub user_id: String,
	/// Role of the user who placed the order.
	pub user_type: UserRole,
	/// Cart snapshot taken at creation; never re-derived afterwards.
	pub items: Vec<CartLine>,
	pub status: OrderStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rider_id: Option<String>,
	pub created_at: u64,
	pub updated_at: u64,
}

/// Delivery-side mirror of an order that reached `accepted`.
///
/// Its status and rider always match the primary order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedOrder {
	pub order_id: String,
	pub store_owner_id: String,
	pub items: Vec<CartLine>,
	pub total_quantity: u64,
	pub status: OrderStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rider_id: Option<String>,
	/// When the store owner accepted the order.
	pub timestamp: u64,
}
