//! Marketplace engine that ties the catalog, directory, carts and order
//! lifecycle together over one storage service.
//!
//! The engine is cheap to clone and shared by every request; it holds no
//! state of its own beyond handles to storage-backed components.

pub mod lifecycle;

use crate::catalog::{AddOutcome, CatalogStore};
use crate::directory::Directory;
use crate::handlers::{CartManager, CartUpdate, DeliveryHandler, OrderHandler, ReviewOutcome};
use crate::state::{OrderStateMachine, RiderLedger};
use crate::MarketError;
use market_config::Config;
use market_storage::StorageService;
use market_types::{
	Cart, DeliverableOrder, NewProduct, Order, OrderView, Product, ProductPatch, User,
};
use std::sync::Arc;

/// Main marketplace engine.
#[derive(Clone)]
pub struct MarketEngine {
	/// Service configuration.
	pub(crate) config: Config,
	/// Storage service shared by all components.
	pub(crate) storage: Arc<StorageService>,
	pub(crate) catalog: Arc<CatalogStore>,
	pub(crate) directory: Arc<Directory>,
	pub(crate) carts: Arc<CartManager>,
	pub(crate) order_handler: Arc<OrderHandler>,
	pub(crate) delivery_handler: Arc<DeliveryHandler>,
	pub(crate) ledger: Arc<RiderLedger>,
}

impl MarketEngine {
	/// Creates a new engine over the given storage service.
	pub fn new(config: Config, storage: Arc<StorageService>) -> Self {
		let catalog = Arc::new(CatalogStore::new(storage.clone()));
		let directory = Arc::new(Directory::new(storage.clone()));
		let state_machine = Arc::new(OrderStateMachine::new(storage.clone()));
		let carts = Arc::new(CartManager::new(storage.clone(), directory.clone()));

		let order_handler = Arc::new(OrderHandler::new(
			storage.clone(),
			directory.clone(),
			catalog.clone(),
			carts.clone(),
			state_machine.clone(),
			config.orders.restock_on_reject,
		));
		let delivery_handler = Arc::new(DeliveryHandler::new(
			storage.clone(),
			directory.clone(),
			catalog.clone(),
			state_machine,
		));
		let ledger = Arc::new(RiderLedger::new(
			storage.clone(),
			directory.clone(),
			catalog.clone(),
		));

		Self {
			config,
			storage,
			catalog,
			directory,
			carts,
			order_handler,
			delivery_handler,
			ledger,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	// Directory

	pub async fn create_user(&self, user_type: &str) -> Result<User, MarketError> {
		self.directory.create_user(user_type).await
	}

	pub async fn get_user(&self, user_id: &str) -> Result<User, MarketError> {
		self.directory.get_user(user_id).await
	}

	pub async fn list_users(&self) -> Result<Vec<User>, MarketError> {
		self.directory.list_users().await
	}

	// Catalog

	pub async fn add_product(&self, product: NewProduct) -> Result<AddOutcome, MarketError> {
		self.catalog.add_product(product).await
	}

	pub async fn get_product(&self, product_id: &str) -> Result<Product, MarketError> {
		self.catalog.get_product(product_id).await
	}

	pub async fn update_product(
		&self,
		product_id: &str,
		patch: ProductPatch,
	) -> Result<Product, MarketError> {
		self.catalog.update_product(product_id, patch).await
	}

	pub async fn delete_product(&self, product_id: &str) -> Result<(), MarketError> {
		self.catalog.delete_product(product_id).await
	}

	// Carts

	pub async fn add_to_cart(
		&self,
		user_id: &str,
		product_id: &str,
		quantity: u32,
	) -> Result<CartUpdate, MarketError> {
		self.carts.add(user_id, product_id, quantity).await
	}

	pub async fn remove_from_cart(
		&self,
		user_id: &str,
		product_id: &str,
	) -> Result<Cart, MarketError> {
		self.carts.remove(user_id, product_id).await
	}

	pub async fn get_cart(&self, user_id: &str) -> Result<Cart, MarketError> {
		self.carts.get(user_id).await
	}

	// Orders

	pub async fn create_order(&self, user_id: &str) -> Result<Order, MarketError> {
		self.order_handler.create_order(user_id).await
	}

	pub async fn user_orders(&self, user_id: &str) -> Result<Vec<Order>, MarketError> {
		self.order_handler.user_orders(user_id).await
	}

	pub async fn review_order(
		&self,
		order_id: &str,
		store_owner_id: &str,
		decision: &str,
	) -> Result<ReviewOutcome, MarketError> {
		self.order_handler
			.review_order(order_id, store_owner_id, decision)
			.await
	}

	// Delivery

	pub async fn list_deliverable_orders(&self) -> Result<Vec<DeliverableOrder>, MarketError> {
		self.delivery_handler.list_deliverable_orders().await
	}

	pub async fn accept_for_delivery(
		&self,
		order_id: &str,
		rider_id: &str,
	) -> Result<Order, MarketError> {
		self.delivery_handler
			.accept_for_delivery(order_id, rider_id)
			.await
	}

	pub async fn mark_delivered(&self, order_id: &str, rider_id: &str) -> Result<Order, MarketError> {
		self.delivery_handler.mark_delivered(order_id, rider_id).await
	}

	pub async fn rider_orders(&self, rider_id: &str) -> Result<Vec<OrderView>, MarketError> {
		self.ledger.rider_orders(rider_id).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{engine, interleaved_engine, new_product};
	use market_types::{AcceptedOrder, OrderStatus, StorageKey};
	use rust_decimal::Decimal;
	use tokio::sync::Barrier;

	struct Market {
		engine: MarketEngine,
		customer: String,
		owner: String,
		rider: String,
		product: String,
	}

	async fn market(restock_on_reject: bool, stock: u64) -> Market {
		market_on(engine(restock_on_reject), stock).await
	}

	async fn market_on(engine: MarketEngine, stock: u64) -> Market {
		let customer = engine.create_user("customer").await.unwrap().user_id;
		let owner = engine.create_user("store_owner").await.unwrap().user_id;
		let rider = engine.create_user("rider").await.unwrap().user_id;
		let product = engine
			.add_product(new_product("Kettle", "20.00", stock))
			.await
			.unwrap()
			.product()
			.id
			.clone();
		Market {
			engine,
			customer,
			owner,
			rider,
			product,
		}
	}

	impl Market {
		async fn stock(&self) -> u64 {
			self.engine.get_product(&self.product).await.unwrap().stock
		}

		async fn order(&self, order_id: &str) -> Order {
			self.engine
				.storage()
				.retrieve(StorageKey::Orders.as_str(), order_id)
				.await
				.unwrap()
		}

		async fn mirror(&self, order_id: &str) -> Option<AcceptedOrder> {
			self.engine
				.storage()
				.load_optional(StorageKey::AcceptedOrders.as_str(), order_id)
				.await
				.unwrap()
				.0
		}

		/// Places an order of `quantity` units for the customer.
		async fn place(&self, quantity: u32) -> Order {
			self.engine
				.add_to_cart(&self.customer, &self.product, quantity)
				.await
				.unwrap();
			self.engine.create_order(&self.customer).await.unwrap()
		}

		async fn accepted(&self, quantity: u32) -> Order {
			let order = self.place(quantity).await;
			self.engine
				.review_order(&order.order_id, &self.owner, "accept")
				.await
				.unwrap();
			order
		}
	}

	#[tokio::test]
	async fn test_create_order_reserves_stock_and_clears_cart() {
		let m = market(false, 5).await;
		let order = m.place(3).await;

		assert_eq!(order.status, OrderStatus::Pending);
		assert_eq!(order.items[0].quantity, 3);
		assert_eq!(m.stock().await, 2);
		assert!(matches!(
			m.engine.get_cart(&m.customer).await,
			Err(MarketError::CartNotFound(_))
		));

		let orders = m.engine.user_orders(&m.customer).await.unwrap();
		assert_eq!(orders, vec![order]);
	}

	#[tokio::test]
	async fn test_insufficient_stock_changes_nothing() {
		let m = market(false, 5).await;
		m.place(3).await;

		let second = m.engine.create_user("customer").await.unwrap().user_id;
		m.engine.add_to_cart(&second, &m.product, 3).await.unwrap();
		let err = m.engine.create_order(&second).await.unwrap_err();
		assert!(matches!(
			err,
			MarketError::InsufficientStock {
				requested: 3,
				available: 2,
				..
			}
		));
		assert_eq!(err.shortfall(), Some(1));
		assert_eq!(m.stock().await, 2);
		// The cart survives a failed checkout.
		assert_eq!(m.engine.get_cart(&second).await.unwrap().items.len(), 1);
	}

	#[tokio::test]
	async fn test_failed_checkout_leaves_other_products_untouched() {
		let m = market(false, 5).await;
		let scarce = m
			.engine
			.add_product(new_product("Teapot", "35.00", 1))
			.await
			.unwrap()
			.product()
			.id
			.clone();

		m.engine.add_to_cart(&m.customer, &m.product, 2).await.unwrap();
		m.engine.add_to_cart(&m.customer, &scarce, 2).await.unwrap();
		assert!(matches!(
			m.engine.create_order(&m.customer).await,
			Err(MarketError::InsufficientStock { .. })
		));
		assert_eq!(m.stock().await, 5);
		assert_eq!(m.engine.get_product(&scarce).await.unwrap().stock, 1);
	}

	#[tokio::test]
	async fn test_create_order_errors() {
		let m = market(false, 5).await;
		assert!(matches!(
			m.engine.create_order("ghost").await,
			Err(MarketError::UserNotFound(_))
		));
		assert!(matches!(
			m.engine.create_order(&m.customer).await,
			Err(MarketError::EmptyCart(_))
		));

		m.engine.add_to_cart(&m.customer, "missing", 1).await.unwrap();
		assert!(matches!(
			m.engine.create_order(&m.customer).await,
			Err(MarketError::ProductNotFound(ref id)) if id == "missing"
		));
		assert!(matches!(
			m.engine.user_orders(&m.customer).await,
			Err(MarketError::NoResults(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_concurrent_checkouts_never_oversell() {
		let m = market(false, 5).await;
		let other = m.engine.create_user("customer").await.unwrap().user_id;
		m.engine.add_to_cart(&m.customer, &m.product, 3).await.unwrap();
		m.engine.add_to_cart(&other, &m.product, 3).await.unwrap();

		let start = Arc::new(Barrier::new(2));
		let handles: Vec<_> = [m.customer.clone(), other]
			.into_iter()
			.map(|user| {
				let engine = m.engine.clone();
				let start = Arc::clone(&start);
				tokio::spawn(async move {
					start.wait().await;
					engine.create_order(&user).await
				})
			})
			.collect();

		let mut placed = 0;
		for handle in handles {
			match handle.await.unwrap() {
				Ok(_) => placed += 1,
				Err(e) => assert!(matches!(
					e,
					MarketError::InsufficientStock { .. } | MarketError::Conflict(_)
				)),
			}
		}
		assert_eq!(placed, 1);
		assert_eq!(m.stock().await, 2);
	}

	#[tokio::test]
	async fn test_checkout_on_stale_stock_conflicts() {
		let (engine, interleave) = interleaved_engine();
		let m = market_on(engine, 5).await;
		let other = m.engine.create_user("customer").await.unwrap().user_id;
		m.engine.add_to_cart(&m.customer, &m.product, 3).await.unwrap();
		m.engine.add_to_cart(&other, &m.product, 3).await.unwrap();

		let rival = m.engine.clone();
		let rival_user = other.clone();
		interleave.before_next_commit(async move {
			rival.create_order(&rival_user).await.unwrap();
		});

		let result = m.engine.create_order(&m.customer).await;
		assert!(matches!(result, Err(MarketError::Conflict(_))), "{result:?}");

		// Only the competing checkout was applied.
		assert_eq!(m.stock().await, 2);
		assert_eq!(m.engine.user_orders(&other).await.unwrap().len(), 1);
		assert!(matches!(
			m.engine.user_orders(&m.customer).await,
			Err(MarketError::NoResults(_))
		));
		assert_eq!(m.engine.get_cart(&m.customer).await.unwrap().items[0].quantity, 3);
	}

	#[tokio::test]
	async fn test_review_on_stale_order_conflicts() {
		let (engine, interleave) = interleaved_engine();
		let m = market_on(engine, 5).await;
		let order = m.place(3).await;

		let rival = m.engine.clone();
		let (order_id, owner) = (order.order_id.clone(), m.owner.clone());
		interleave.before_next_commit(async move {
			rival.review_order(&order_id, &owner, "reject").await.unwrap();
		});

		let result = m.engine.review_order(&order.order_id, &m.owner, "accept").await;
		assert!(matches!(result, Err(MarketError::Conflict(_))), "{result:?}");

		assert_eq!(m.order(&order.order_id).await.status, OrderStatus::Rejected);
		assert!(m.mirror(&order.order_id).await.is_none());
		assert_eq!(m.stock().await, 2);
	}

	#[tokio::test]
	async fn test_review_accept_writes_mirror_once() {
		let m = market(false, 5).await;
		let order = m.place(3).await;

		let outcome = m
			.engine
			.review_order(&order.order_id, &m.owner, "accept")
			.await
			.unwrap();
		assert_eq!(outcome.order.status, OrderStatus::Accepted);
		assert_eq!(outcome.total_quantity, 3);

		let mirror = m.mirror(&order.order_id).await.unwrap();
		assert_eq!(mirror.status, OrderStatus::Accepted);
		assert_eq!(mirror.total_quantity, 3);
		assert_eq!(mirror.store_owner_id, m.owner);

		for decision in ["accept", "reject"] {
			assert!(matches!(
				m.engine
					.review_order(&order.order_id, &m.owner, decision)
					.await,
				Err(MarketError::InvalidState {
					status: OrderStatus::Accepted,
					..
				})
			));
		}
		let stored = &m.engine.user_orders(&m.customer).await.unwrap()[0];
		assert_eq!(stored.status, OrderStatus::Accepted);
	}

	#[tokio::test]
	async fn test_review_errors() {
		let m = market(false, 5).await;
		let order = m.place(1).await;

		assert!(matches!(
			m.engine
				.review_order(&order.order_id, &m.owner, "maybe")
				.await,
			Err(MarketError::InvalidInput(_))
		));
		assert!(matches!(
			m.engine.review_order("missing", &m.owner, "accept").await,
			Err(MarketError::OrderNotFound(_))
		));
		assert!(matches!(
			m.engine
				.review_order(&order.order_id, &m.customer, "accept")
				.await,
			Err(MarketError::Unauthorized(_))
		));
		assert_eq!(
			m.engine.user_orders(&m.customer).await.unwrap()[0].status,
			OrderStatus::Pending
		);
	}

	#[tokio::test]
	async fn test_reject_keeps_stock_by_default() {
		let m = market(false, 5).await;
		let order = m.place(3).await;
		let outcome = m
			.engine
			.review_order(&order.order_id, &m.owner, "reject")
			.await
			.unwrap();
		assert_eq!(outcome.order.status, OrderStatus::Rejected);
		assert_eq!(m.stock().await, 2);
		assert!(m.mirror(&order.order_id).await.is_none());
	}

	#[tokio::test]
	async fn test_reject_restocks_when_enabled() {
		let m = market(true, 5).await;
		let order = m.place(3).await;
		m.engine
			.review_order(&order.order_id, &m.owner, "reject")
			.await
			.unwrap();
		assert_eq!(m.stock().await, 5);
	}

	#[tokio::test]
	async fn test_reject_restock_skips_deleted_products() {
		let m = market(true, 5).await;
		let order = m.place(3).await;
		m.engine.delete_product(&m.product).await.unwrap();
		let outcome = m
			.engine
			.review_order(&order.order_id, &m.owner, "reject")
			.await
			.unwrap();
		assert_eq!(outcome.order.status, OrderStatus::Rejected);
	}

	#[tokio::test]
	async fn test_deliverable_orders_use_live_prices() {
		let m = market(false, 5).await;
		assert!(matches!(
			m.engine.list_deliverable_orders().await,
			Err(MarketError::NoResults(_))
		));

		let pending = m.place(1).await;
		let order = m.accepted(2).await;
		let listed = m.engine.list_deliverable_orders().await.unwrap();
		assert_eq!(listed.len(), 1);
		assert_eq!(listed[0].order_id, order.order_id);
		assert_ne!(listed[0].order_id, pending.order_id);
		assert_eq!(listed[0].total_price, Decimal::from(40));

		m.engine
			.update_product(&m.product, market_types::ProductPatch {
				price: Some(Decimal::from(25)),
				..Default::default()
			})
			.await
			.unwrap();
		let listed = m.engine.list_deliverable_orders().await.unwrap();
		assert_eq!(listed[0].total_price, Decimal::from(50));

		m.engine.delete_product(&m.product).await.unwrap();
		assert!(matches!(
			m.engine.list_deliverable_orders().await,
			Err(MarketError::ProductNotFound(_))
		));
	}

	#[tokio::test]
	async fn test_accept_for_delivery_assigns_rider() {
		let m = market(false, 5).await;
		let order = m.accepted(3).await;

		let updated = m
			.engine
			.accept_for_delivery(&order.order_id, &m.rider)
			.await
			.unwrap();
		assert_eq!(updated.status, OrderStatus::OnTheWay);
		assert_eq!(updated.rider_id.as_deref(), Some(m.rider.as_str()));

		let mirror = m.mirror(&order.order_id).await.unwrap();
		assert_eq!(mirror.status, OrderStatus::OnTheWay);
		assert_eq!(mirror.rider_id.as_deref(), Some(m.rider.as_str()));

		let rider = m.engine.get_user(&m.rider).await.unwrap();
		assert!(rider.assigned_orders.contains(&order.order_id));

		let other = m.engine.create_user("rider").await.unwrap().user_id;
		assert!(matches!(
			m.engine.accept_for_delivery(&order.order_id, &other).await,
			Err(MarketError::InvalidState { .. })
		));
		assert!(m
			.engine
			.get_user(&other)
			.await
			.unwrap()
			.assigned_orders
			.is_empty());
		assert!(matches!(
			m.engine.list_deliverable_orders().await,
			Err(MarketError::NoResults(_))
		));
	}

	#[tokio::test]
	async fn test_accept_for_delivery_errors() {
		let m = market(false, 5).await;
		let pending = m.place(1).await;

		assert!(matches!(
			m.engine.accept_for_delivery(&pending.order_id, &m.owner).await,
			Err(MarketError::Unauthorized(_))
		));
		// Never accepted, so there is no mirror.
		assert!(matches!(
			m.engine.accept_for_delivery(&pending.order_id, &m.rider).await,
			Err(MarketError::OrderNotFound(_))
		));
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
	async fn test_concurrent_acceptance_assigns_one_rider() {
		let m = market(false, 5).await;
		let order = m.accepted(1).await;
		let other = m.engine.create_user("rider").await.unwrap().user_id;

		let start = Arc::new(Barrier::new(2));
		let handles: Vec<_> = [m.rider.clone(), other.clone()]
			.into_iter()
			.map(|rider| {
				let engine = m.engine.clone();
				let start = Arc::clone(&start);
				let order_id = order.order_id.clone();
				tokio::spawn(async move {
					start.wait().await;
					engine.accept_for_delivery(&order_id, &rider).await
				})
			})
			.collect();

		let mut accepted = 0;
		for handle in handles {
			if handle.await.unwrap().is_ok() {
				accepted += 1;
			}
		}
		assert_eq!(accepted, 1);

		let mut holders = 0;
		for rider in [&m.rider, &other] {
			let user = m.engine.get_user(rider).await.unwrap();
			if user.assigned_orders.contains(&order.order_id) {
				holders += 1;
			}
		}
		assert_eq!(holders, 1);
	}

	#[tokio::test]
	async fn test_acceptance_on_stale_mirror_conflicts() {
		let (engine, interleave) = interleaved_engine();
		let m = market_on(engine, 5).await;
		let order = m.accepted(1).await;
		let other = m.engine.create_user("rider").await.unwrap().user_id;

		let rival = m.engine.clone();
		let (order_id, rival_rider) = (order.order_id.clone(), other.clone());
		interleave.before_next_commit(async move {
			rival
				.accept_for_delivery(&order_id, &rival_rider)
				.await
				.unwrap();
		});

		let result = m.engine.accept_for_delivery(&order.order_id, &m.rider).await;
		assert!(matches!(result, Err(MarketError::Conflict(_))), "{result:?}");

		let stored = m.order(&order.order_id).await;
		assert_eq!(stored.status, OrderStatus::OnTheWay);
		assert_eq!(stored.rider_id.as_deref(), Some(other.as_str()));
		assert_eq!(
			m.mirror(&order.order_id).await.unwrap().rider_id.as_deref(),
			Some(other.as_str())
		);
		assert!(m.engine.get_user(&m.rider).await.unwrap().assigned_orders.is_empty());
		assert!(m
			.engine
			.get_user(&other)
			.await
			.unwrap()
			.assigned_orders
			.contains(&order.order_id));
	}

	#[tokio::test]
	async fn test_mark_delivered_completes_assignment() {
		let m = market(false, 5).await;
		let order = m.accepted(3).await;
		m.engine
			.accept_for_delivery(&order.order_id, &m.rider)
			.await
			.unwrap();

		let other = m.engine.create_user("rider").await.unwrap().user_id;
		assert!(matches!(
			m.engine.mark_delivered(&order.order_id, &other).await,
			Err(MarketError::NotAssigned { .. })
		));

		let delivered = m
			.engine
			.mark_delivered(&order.order_id, &m.rider)
			.await
			.unwrap();
		assert_eq!(delivered.status, OrderStatus::Delivered);
		assert_eq!(
			m.mirror(&order.order_id).await.unwrap().status,
			OrderStatus::Delivered
		);

		let rider = m.engine.get_user(&m.rider).await.unwrap();
		assert!(!rider.assigned_orders.contains(&order.order_id));
		assert!(rider.completed_orders.contains(&order.order_id));

		assert!(matches!(
			m.engine.mark_delivered(&order.order_id, &m.rider).await,
			Err(MarketError::InvalidState {
				status: OrderStatus::Delivered,
				..
			})
		));
	}

	#[tokio::test]
	async fn test_mark_delivered_requires_on_the_way() {
		let m = market(false, 5).await;
		let order = m.accepted(1).await;
		// Accepted but not picked up: no rider is recorded on the order.
		assert!(matches!(
			m.engine.mark_delivered(&order.order_id, &m.rider).await,
			Err(MarketError::NotAssigned { .. })
		));
		assert!(matches!(
			m.engine.mark_delivered("missing", &m.rider).await,
			Err(MarketError::OrderNotFound(_))
		));
	}

	#[tokio::test]
	async fn test_rider_orders() {
		let m = market(false, 5).await;
		assert!(matches!(
			m.engine.rider_orders(&m.customer).await,
			Err(MarketError::Unauthorized(_))
		));
		assert!(matches!(
			m.engine.rider_orders(&m.rider).await,
			Err(MarketError::NoResults(_))
		));

		let order = m.accepted(2).await;
		m.engine
			.accept_for_delivery(&order.order_id, &m.rider)
			.await
			.unwrap();

		let views = m.engine.rider_orders(&m.rider).await.unwrap();
		assert_eq!(views.len(), 1);
		assert_eq!(views[0].status, OrderStatus::OnTheWay);
		assert_eq!(views[0].items[0].price, Decimal::from(20));
		assert_eq!(views[0].total_price, Decimal::from(40));

		m.engine
			.mark_delivered(&order.order_id, &m.rider)
			.await
			.unwrap();
		assert!(matches!(
			m.engine.rider_orders(&m.rider).await,
			Err(MarketError::NoResults(_))
		));
	}
}
