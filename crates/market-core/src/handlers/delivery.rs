//! Delivery handler for rider-facing transitions.
//!
//! Each transition writes the order, its accepted mirror and the rider
//! profile in one transaction guarded on the revisions read, so the mirror
//! never disagrees with the order and an order is never assigned twice.

use crate::catalog::CatalogStore;
use crate::directory::Directory;
use crate::state::{OrderStateMachine, RiderLedger};
use crate::MarketError;
use market_storage::{StorageService, Transaction, Versioned};
use market_types::{
	truncate_id, AcceptedOrder, DeliverableOrder, Order, OrderStatus, StorageKey, UserRole,
};
use std::sync::Arc;
use tracing::instrument;

pub struct DeliveryHandler {
	storage: Arc<StorageService>,
	directory: Arc<Directory>,
	catalog: Arc<CatalogStore>,
	state_machine: Arc<OrderStateMachine>,
}

impl DeliveryHandler {
	pub fn new(
		storage: Arc<StorageService>,
		directory: Arc<Directory>,
		catalog: Arc<CatalogStore>,
		state_machine: Arc<OrderStateMachine>,
	) -> Self {
		Self {
			storage,
			directory,
			catalog,
			state_machine,
		}
	}

	/// Accepted orders waiting for a rider, with totals at current prices.
	pub async fn list_deliverable_orders(&self) -> Result<Vec<DeliverableOrder>, MarketError> {
		let mirrors: Vec<AcceptedOrder> = self
			.storage
			.list(StorageKey::AcceptedOrders.as_str())
			.await?;

		let mut deliverable = Vec::new();
		for mirror in mirrors
			.into_iter()
			.filter(|m| m.status == OrderStatus::Accepted)
		{
			let (_, total_price) = self.catalog.price_lines(&mirror.items).await?;
			deliverable.push(DeliverableOrder {
				order_id: mirror.order_id,
				store_owner_id: mirror.store_owner_id,
				items: mirror.items,
				total_quantity: mirror.total_quantity,
				total_price,
				status: mirror.status,
			});
		}

		if deliverable.is_empty() {
			return Err(MarketError::NoResults(
				"No accepted orders available for delivery.".into(),
			));
		}
		Ok(deliverable)
	}

	/// Assigns an accepted order to a rider and puts it on the way.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn accept_for_delivery(
		&self,
		order_id: &str,
		rider_id: &str,
	) -> Result<Order, MarketError> {
		let rider = self
			.directory
			.require_role(rider_id, UserRole::Rider)
			.await?;
		let Versioned {
			value: mut mirror,
			revision: mirror_revision,
		} = self.state_machine.load_mirror(order_id).await?;
		self.state_machine
			.transition_mirror(&mut mirror, OrderStatus::OnTheWay)?;

		let Versioned {
			value: mut order,
			revision: order_revision,
		} = self.state_machine.load_order(order_id).await?;
		self.state_machine
			.transition(&mut order, OrderStatus::OnTheWay)?;

		order.rider_id = Some(rider_id.to_string());
		mirror.rider_id = Some(rider_id.to_string());

		let mut tx = Transaction::new();
		tx.put(StorageKey::Orders.as_str(), order_id, &order, &order_revision)?;
		tx.put(
			StorageKey::AcceptedOrders.as_str(),
			order_id,
			&mirror,
			&mirror_revision,
		)?;
		let update = RiderLedger::assign(&rider.value, order_id);
		self.directory.stage_profile(&mut tx, rider, update)?;
		self.storage.commit(tx).await?;

		tracing::info!(rider_id = %truncate_id(rider_id), "Order on the way");
		Ok(order)
	}

	/// Completes delivery of an order by its assigned rider.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn mark_delivered(
		&self,
		order_id: &str,
		rider_id: &str,
	) -> Result<Order, MarketError> {
		let rider = self
			.directory
			.require_role(rider_id, UserRole::Rider)
			.await?;
		let Versioned {
			value: mut order,
			revision: order_revision,
		} = self.state_machine.load_order(order_id).await?;
		let Versioned {
			value: mut mirror,
			revision: mirror_revision,
		} = self.state_machine.load_mirror(order_id).await?;

		if order.rider_id.as_deref() != Some(rider_id) {
			return Err(MarketError::NotAssigned {
				order_id: order_id.to_string(),
				rider_id: rider_id.to_string(),
			});
		}

		self.state_machine
			.transition(&mut order, OrderStatus::Delivered)?;
		self.state_machine
			.transition_mirror(&mut mirror, OrderStatus::Delivered)?;

		let mut tx = Transaction::new();
		tx.put(StorageKey::Orders.as_str(), order_id, &order, &order_revision)?;
		tx.put(
			StorageKey::AcceptedOrders.as_str(),
			order_id,
			&mirror,
			&mirror_revision,
		)?;
		let update = RiderLedger::complete(&rider.value, order_id);
		self.directory.stage_profile(&mut tx, rider, update)?;
		self.storage.commit(tx).await?;

		tracing::info!(rider_id = %truncate_id(rider_id), "Order delivered");
		Ok(order)
	}
}
