//! Order handler for checkout and store-owner review.
//!
//! Order creation reserves stock, writes the order and its index entry and
//! clears the cart in one guarded transaction: either every write lands or
//! none does.

use crate::catalog::CatalogStore;
use crate::directory::Directory;
use crate::handlers::CartManager;
use crate::state::OrderStateMachine;
use crate::MarketError;
use market_storage::{StorageService, Transaction, Versioned};
use market_types::{
	current_timestamp, total_quantity, truncate_id, AcceptedOrder, CartLine, Order, OrderStatus,
	ReviewDecision, StorageKey, UserRole,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Outcome of a store owner's review.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
	pub order: Order,
	pub total_quantity: u64,
}

/// Handler for order creation, review and customer lookups.
pub struct OrderHandler {
	storage: Arc<StorageService>,
	directory: Arc<Directory>,
	catalog: Arc<CatalogStore>,
	carts: Arc<CartManager>,
	state_machine: Arc<OrderStateMachine>,
	restock_on_reject: bool,
}

/// Sums line quantities per product, in product id order.
fn reservations(items: &[CartLine]) -> BTreeMap<&str, u64> {
	let mut reserved = BTreeMap::new();
	for line in items {
		*reserved.entry(line.product_id.as_str()).or_insert(0u64) += u64::from(line.quantity);
	}
	reserved
}

impl OrderHandler {
	pub fn new(
		storage: Arc<StorageService>,
		directory: Arc<Directory>,
		catalog: Arc<CatalogStore>,
		carts: Arc<CartManager>,
		state_machine: Arc<OrderStateMachine>,
		restock_on_reject: bool,
	) -> Self {
		Self {
			storage,
			directory,
			catalog,
			carts,
			state_machine,
			restock_on_reject,
		}
	}

	/// Creates a pending order from the user's cart.
	#[instrument(skip_all, fields(user_id = %truncate_id(user_id)))]
	pub async fn create_order(&self, user_id: &str) -> Result<Order, MarketError> {
		let user = self.directory.get_user(user_id).await?;
		let cart = self.carts.snapshot(user_id).await?;

		let mut tx = Transaction::new();
		for (product_id, requested) in reservations(&cart.value.items) {
			let Versioned {
				value: mut product,
				revision,
			} = self.catalog.load_product(product_id).await?;

			let available = product.stock;
			product.stock =
				available
					.checked_sub(requested)
					.ok_or_else(|| MarketError::InsufficientStock {
						product_id: product_id.to_string(),
						requested,
						available,
					})?;
			tx.put(StorageKey::Products.as_str(), product_id, &product, &revision)?;
		}

		let now = current_timestamp();
		let order = Order {
			order_id: uuid::Uuid::new_v4().to_string(),
			user_id: user.user_id.clone(),
			user_type: user.user_type,
			items: cart.value.items,
			status: OrderStatus::Pending,
			rider_id: None,
			created_at: now,
			updated_at: now,
		};
		tx.insert(StorageKey::Orders.as_str(), &order.order_id, &order)?;

		let (index, index_revision) = self
			.storage
			.load_optional::<Vec<String>>(StorageKey::UserOrders.as_str(), user_id)
			.await?;
		let mut index = index.unwrap_or_default();
		index.push(order.order_id.clone());
		tx.put(
			StorageKey::UserOrders.as_str(),
			user_id,
			&index,
			&index_revision,
		)?;

		self.carts.stage_clear(&mut tx, user_id, &cart.revision);
		self.storage.commit(tx).await?;

		tracing::info!(
			order_id = %truncate_id(&order.order_id),
			lines = order.items.len(),
			"Order placed"
		);
		Ok(order)
	}

	/// Accepts or rejects a pending order on behalf of a store owner.
	#[instrument(skip_all, fields(order_id = %truncate_id(order_id)))]
	pub async fn review_order(
		&self,
		order_id: &str,
		store_owner_id: &str,
		decision: &str,
	) -> Result<ReviewOutcome, MarketError> {
		let decision: ReviewDecision = decision.parse().map_err(MarketError::InvalidInput)?;

		let Versioned {
			value: mut order,
			revision,
		} = self.state_machine.load_order(order_id).await?;
		self.state_machine
			.transition(&mut order, decision.target_status())?;

		let owner = self
			.directory
			.require_role(store_owner_id, UserRole::StoreOwner)
			.await?;
		if order.items.is_empty() {
			return Err(MarketError::EmptyOrder(order_id.to_string()));
		}
		let total_quantity = total_quantity(&order.items);

		let mut tx = Transaction::new();
		tx.put(StorageKey::Orders.as_str(), order_id, &order, &revision)?;
		match decision {
			ReviewDecision::Accept => {
				let mirror = AcceptedOrder {
					order_id: order.order_id.clone(),
					store_owner_id: owner.value.user_id,
					items: order.items.clone(),
					total_quantity,
					status: order.status,
					rider_id: None,
					timestamp: order.updated_at,
				};
				tx.insert(StorageKey::AcceptedOrders.as_str(), order_id, &mirror)?;
			},
			ReviewDecision::Reject if self.restock_on_reject => {
				self.stage_restock(&mut tx, &order.items).await?;
			},
			ReviewDecision::Reject => {},
		}
		self.storage.commit(tx).await?;

		tracing::info!(status = %order.status, total_quantity, "Order reviewed");
		Ok(ReviewOutcome {
			order,
			total_quantity,
		})
	}

	/// Returns reserved units of a rejected order to stock.
	///
	/// Products deleted since checkout are skipped.
	async fn stage_restock(
		&self,
		tx: &mut Transaction,
		items: &[CartLine],
	) -> Result<(), MarketError> {
		for (product_id, quantity) in reservations(items) {
			let current = match self.catalog.load_product(product_id).await {
				Ok(current) => current,
				Err(MarketError::ProductNotFound(_)) => {
					tracing::debug!(product_id = %product_id, "Skipping restock of removed product");
					continue;
				},
				Err(e) => return Err(e),
			};
			let Versioned {
				value: mut product,
				revision,
			} = current;
			product.stock = product.stock.saturating_add(quantity);
			tx.put(StorageKey::Products.as_str(), product_id, &product, &revision)?;
		}
		Ok(())
	}

	/// Orders placed by a user, oldest first.
	pub async fn user_orders(&self, user_id: &str) -> Result<Vec<Order>, MarketError> {
		self.directory.get_user(user_id).await?;

		let index: Vec<String> = self
			.storage
			.load_optional(StorageKey::UserOrders.as_str(), user_id)
			.await?
			.0
			.unwrap_or_default();

		let mut orders = Vec::with_capacity(index.len());
		for order_id in &index {
			match self.state_machine.load_order(order_id).await {
				Ok(order) => orders.push(order.value),
				Err(MarketError::OrderNotFound(_)) => continue,
				Err(e) => return Err(e),
			}
		}

		if orders.is_empty() {
			return Err(MarketError::NoResults(
				"No orders found for this user".into(),
			));
		}
		Ok(orders)
	}
}
