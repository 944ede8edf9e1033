//! Cart manager.
//!
//! Carts are read from and written back to storage on every call, guarded on
//! the revision read, so concurrent edits of one cart surface as conflicts
//! instead of lost updates.

use crate::directory::Directory;
use crate::MarketError;
use market_storage::{Revision, StorageService, Transaction, Versioned};
use market_types::{Cart, StorageKey};
use std::sync::Arc;

/// A cart after an add, and whether an existing line absorbed the quantity.
#[derive(Debug, Clone)]
pub struct CartUpdate {
	pub cart: Cart,
	pub merged: bool,
}

pub struct CartManager {
	storage: Arc<StorageService>,
	directory: Arc<Directory>,
}

impl CartManager {
	pub fn new(storage: Arc<StorageService>, directory: Arc<Directory>) -> Self {
		Self { storage, directory }
	}

	async fn load_cart(&self, user_id: &str) -> Result<(Cart, Revision), MarketError> {
		let (cart, revision) = self
			.storage
			.load_optional::<Cart>(StorageKey::Carts.as_str(), user_id)
			.await?;
		Ok((cart.unwrap_or_default(), revision))
	}

	/// Adds a product to a user's cart, merging with an existing line.
	///
	/// Stock is not checked here; it is reserved at order creation.
	pub async fn add(
		&self,
		user_id: &str,
		product_id: &str,
		quantity: u32,
	) -> Result<CartUpdate, MarketError> {
		if product_id.trim().is_empty() || quantity == 0 {
			return Err(MarketError::InvalidInput(
				"Product ID and quantity are required".into(),
			));
		}
		self.directory.get_user(user_id).await?;

		let (mut cart, revision) = self.load_cart(user_id).await?;
		let merged = cart.add(product_id, quantity).ok_or_else(|| {
			MarketError::InvalidInput(format!(
				"Quantity of product {} in the cart would exceed {}",
				product_id,
				u32::MAX
			))
		})?;

		let mut tx = Transaction::new();
		tx.put(StorageKey::Carts.as_str(), user_id, &cart, &revision)?;
		self.storage.commit(tx).await?;

		tracing::debug!(user_id = %user_id, product_id = %product_id, quantity, merged, "Cart updated");
		Ok(CartUpdate { cart, merged })
	}

	/// Removes the line for `product_id`. Missing carts and lines are a no-op.
	pub async fn remove(&self, user_id: &str, product_id: &str) -> Result<Cart, MarketError> {
		self.directory.get_user(user_id).await?;

		let (mut cart, revision) = self.load_cart(user_id).await?;
		if !cart.remove(product_id) {
			return Ok(cart);
		}

		let mut tx = Transaction::new();
		if cart.is_empty() {
			tx.delete(StorageKey::Carts.as_str(), user_id, &revision);
		} else {
			tx.put(StorageKey::Carts.as_str(), user_id, &cart, &revision)?;
		}
		self.storage.commit(tx).await?;
		Ok(cart)
	}

	pub async fn get(&self, user_id: &str) -> Result<Cart, MarketError> {
		self.directory.get_user(user_id).await?;
		let (cart, _) = self.load_cart(user_id).await?;
		if cart.is_empty() {
			return Err(MarketError::CartNotFound(user_id.to_string()));
		}
		Ok(cart)
	}

	/// Reads the cart an order is about to be created from.
	pub(crate) async fn snapshot(&self, user_id: &str) -> Result<Versioned<Cart>, MarketError> {
		let (cart, revision) = self.load_cart(user_id).await?;
		if cart.is_empty() {
			return Err(MarketError::EmptyCart(user_id.to_string()));
		}
		Ok(Versioned {
			value: cart,
			revision,
		})
	}

	/// Stages deletion of a snapshotted cart in the order's transaction.
	pub(crate) fn stage_clear(&self, tx: &mut Transaction, user_id: &str, revision: &Revision) {
		tx.delete(StorageKey::Carts.as_str(), user_id, revision);
	}
}
