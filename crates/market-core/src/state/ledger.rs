//! Rider assignment ledger.
//!
//! Tracks which orders each rider is carrying and has completed. The ledger
//! only computes profile updates; the delivery transitions stage them in
//! the same transaction as the order change.

use crate::catalog::CatalogStore;
use crate::directory::Directory;
use crate::MarketError;
use market_storage::StorageService;
use market_types::{Order, OrderView, ProfileUpdate, StorageKey, User, UserRole};
use std::sync::Arc;

pub struct RiderLedger {
	storage: Arc<StorageService>,
	directory: Arc<Directory>,
	catalog: Arc<CatalogStore>,
}

impl RiderLedger {
	pub fn new(
		storage: Arc<StorageService>,
		directory: Arc<Directory>,
		catalog: Arc<CatalogStore>,
	) -> Self {
		Self {
			storage,
			directory,
			catalog,
		}
	}

	/// Profile update adding `order_id` to the rider's assigned orders.
	pub fn assign(rider: &User, order_id: &str) -> ProfileUpdate {
		let mut assigned = rider.assigned_orders.clone();
		assigned.insert(order_id.to_string());
		ProfileUpdate {
			assigned_orders: Some(assigned),
			completed_orders: None,
		}
	}

	/// Profile update moving `order_id` from assigned to completed.
	pub fn complete(rider: &User, order_id: &str) -> ProfileUpdate {
		let mut assigned = rider.assigned_orders.clone();
		let mut completed = rider.completed_orders.clone();
		assigned.remove(order_id);
		completed.insert(order_id.to_string());
		ProfileUpdate {
			assigned_orders: Some(assigned),
			completed_orders: Some(completed),
		}
	}

	/// Orders a rider is currently carrying, priced at current catalog prices.
	pub async fn rider_orders(&self, rider_id: &str) -> Result<Vec<OrderView>, MarketError> {
		let rider = self
			.directory
			.require_role(rider_id, UserRole::Rider)
			.await?
			.value;

		let mut views = Vec::with_capacity(rider.assigned_orders.len());
		for order_id in &rider.assigned_orders {
			let (order, _) = self
				.storage
				.load_optional::<Order>(StorageKey::Orders.as_str(), order_id)
				.await?;
			let Some(order) = order else {
				tracing::warn!(rider_id = %rider_id, order_id = %order_id, "Assigned order missing");
				continue;
			};

			let (items, total_price) = self.catalog.price_lines(&order.items).await?;
			views.push(OrderView {
				order_id: order.order_id,
				user_id: order.user_id,
				status: order.status,
				rider_id: order.rider_id,
				items,
				total_price,
			});
		}

		if views.is_empty() {
			return Err(MarketError::NoResults(
				"No orders assigned to the rider.".into(),
			));
		}
		Ok(views)
	}
}
