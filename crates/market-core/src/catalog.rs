//! Catalog store adapter.
//!
//! Every stock change is a guarded write on the revision the product was read
//! at, so two writers racing on the same product cannot both succeed.

use crate::MarketError;
use market_storage::{StorageService, Transaction, Versioned};
use market_types::{CartLine, NewProduct, PricedLine, Product, ProductPatch, StorageKey};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Result of adding a product to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
	/// A new product was inserted.
	Created(Product),
	/// An identical listing existed and was restocked.
	Restocked(Product),
}

impl AddOutcome {
	pub fn product(&self) -> &Product {
		match self {
			AddOutcome::Created(p) | AddOutcome::Restocked(p) => p,
		}
	}
}

pub struct CatalogStore {
	storage: Arc<StorageService>,
}

impl CatalogStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn get_product(&self, product_id: &str) -> Result<Product, MarketError> {
		Ok(self.load_product(product_id).await?.value)
	}

	/// Loads a product with its revision.
	pub async fn load_product(&self, product_id: &str) -> Result<Versioned<Product>, MarketError> {
		let (product, revision) = self
			.storage
			.load_optional::<Product>(StorageKey::Products.as_str(), product_id)
			.await?;
		match product {
			Some(value) => Ok(Versioned { value, revision }),
			None => Err(MarketError::ProductNotFound(product_id.to_string())),
		}
	}

	/// Adds a product, or restocks an existing product with the same listing.
	pub async fn add_product(&self, new: NewProduct) -> Result<AddOutcome, MarketError> {
		new.validate().map_err(MarketError::InvalidInput)?;

		let existing = self
			.storage
			.list::<Product>(StorageKey::Products.as_str())
			.await?
			.into_iter()
			.find(|p| p.same_listing(&new));

		if let Some(existing) = existing {
			let current = self.load_product(&existing.id).await?;
			let stock = current.value.stock.checked_add(new.stock).ok_or_else(|| {
				MarketError::InvalidInput(format!("Stock overflow for product {}", existing.id))
			})?;
			let product = self.write_stock(current, stock).await?;
			tracing::info!(product_id = %product.id, stock = product.stock, "Product restocked");
			return Ok(AddOutcome::Restocked(product));
		}

		let product = new.into_product(uuid::Uuid::new_v4().to_string());
		let mut tx = Transaction::new();
		tx.insert(StorageKey::Products.as_str(), &product.id, &product)?;
		self.storage.commit(tx).await?;

		tracing::info!(product_id = %product.id, store = %product.store_name, "Product added");
		Ok(AddOutcome::Created(product))
	}

	pub async fn update_product(
		&self,
		product_id: &str,
		patch: ProductPatch,
	) -> Result<Product, MarketError> {
		patch.validate().map_err(MarketError::InvalidInput)?;

		let Versioned {
			value: mut product,
			revision,
		} = self.load_product(product_id).await?;
		product.apply(patch);

		let mut tx = Transaction::new();
		tx.put(StorageKey::Products.as_str(), product_id, &product, &revision)?;
		self.storage.commit(tx).await?;
		Ok(product)
	}

	pub async fn delete_product(&self, product_id: &str) -> Result<(), MarketError> {
		let current = self.load_product(product_id).await?;
		let mut tx = Transaction::new();
		tx.delete(StorageKey::Products.as_str(), product_id, &current.revision);
		self.storage.commit(tx).await?;
		tracing::info!(product_id = %product_id, "Product deleted");
		Ok(())
	}

	/// Overwrites the stock of a product.
	pub async fn update_stock(&self, product_id: &str, stock: u64) -> Result<Product, MarketError> {
		let current = self.load_product(product_id).await?;
		self.write_stock(current, stock).await
	}

	/// Sets stock to `new` only if it currently equals `expected`.
	pub async fn compare_and_set_stock(
		&self,
		product_id: &str,
		expected: u64,
		new: u64,
	) -> Result<Product, MarketError> {
		let current = self.load_product(product_id).await?;
		if current.value.stock != expected {
			return Err(MarketError::Conflict(format!(
				"{}:{}",
				StorageKey::Products.as_str(),
				product_id
			)));
		}
		self.write_stock(current, new).await
	}

	async fn write_stock(
		&self,
		current: Versioned<Product>,
		stock: u64,
	) -> Result<Product, MarketError> {
		let Versioned {
			value: mut product,
			revision,
		} = current;
		product.stock = stock;

		let mut tx = Transaction::new();
		tx.put(StorageKey::Products.as_str(), &product.id, &product, &revision)?;
		self.storage.commit(tx).await?;
		Ok(product)
	}

	/// Joins order lines with current catalog prices.
	///
	/// Fails with `ProductNotFound` if any line's product has been removed.
	pub async fn price_lines(
		&self,
		items: &[CartLine],
	) -> Result<(Vec<PricedLine>, Decimal), MarketError> {
		let mut lines = Vec::with_capacity(items.len());
		let mut total = Decimal::ZERO;
		for item in items {
			let product = self.get_product(&item.product_id).await?;
			total = product
				.price
				.checked_mul(Decimal::from(item.quantity))
				.and_then(|line_total| total.checked_add(line_total))
				.ok_or_else(|| {
					MarketError::InvalidInput(format!(
						"Price overflow for product {}",
						item.product_id
					))
				})?;
			lines.push(PricedLine {
				product_id: item.product_id.clone(),
				quantity: item.quantity,
				price: product.price,
			});
		}
		Ok((lines, total))
	}
}
