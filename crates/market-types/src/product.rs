//! Catalog product types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog product.
///
/// `stock` is unsigned so the type itself rules out negative inventory; every
/// decrement goes through a checked subtraction before it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
	/// Store-assigned opaque identifier.
	pub id: String,
	pub name: String,
	pub description: String,
	/// Unit price, never negative.
	pub price: Decimal,
	pub image_url: String,
	/// Name of the store selling this product.
	pub store_name: String,
	/// Units currently available for reservation.
	pub stock: u64,
}

impl Product {
	/// Returns true when `other` describes the same listing, ignoring id and stock.
	pub fn same_listing(&self, other: &NewProduct) -> bool {
		self.name == other.name
			&& self.description == other.description
			&& self.price == other.price
			&& self.image_url == other.image_url
			&& self.store_name == other.store_name
	}

	/// Applies a partial update in place.
	pub fn apply(&mut self, patch: ProductPatch) {
		if let Some(name) = patch.name {
			self.name = name;
		}
		if let Some(description) = patch.description {
			self.description = description;
		}
		if let Some(price) = patch.price {
			self.price = price;
		}
		if let Some(image_url) = patch.image_url {
			self.image_url = image_url;
		}
		if let Some(store_name) = patch.store_name {
			self.store_name = store_name;
		}
		if let Some(stock) = patch.stock {
			self.stock = stock;
		}
	}
}

/// Request body for adding a product to the catalog.
///
/// When a product with the same listing already exists, `stock` is added to
/// its inventory instead of creating a duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
	pub name: String,
	pub description: String,
	pub price: Decimal,
	pub image_url: String,
	pub store_name: String,
	#[serde(default = "default_new_stock")]
	pub stock: u64,
}

fn default_new_stock() -> u64 {
	1
}

impl NewProduct {
	/// Checks that all descriptive fields are present and the price is not negative.
	pub fn validate(&self) -> Result<(), String> {
		let missing: Vec<&str> = [
			("name", &self.name),
			("description", &self.description),
			("image_url", &self.image_url),
			("store_name", &self.store_name),
		]
		.into_iter()
		.filter(|(_, v)| v.trim().is_empty())
		.map(|(k, _)| k)
		.collect();

		if !missing.is_empty() {
			return Err(format!("Missing required fields: {}", missing.join(", ")));
		}
		if self.price < Decimal::ZERO {
			return Err("Price must not be negative".into());
		}
		Ok(())
	}

	/// Builds the product record under the given id.
	pub fn into_product(self, id: String) -> Product {
		Product {
			id,
			name: self.name,
			description: self.description,
			price: self.price,
			image_url: self.image_url,
			store_name: self.store_name,
			stock: self.stock,
		}
	}
}

/// Partial product update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
	pub name: Option<String>,
	pub description: Option<String>,
	pub price: Option<Decimal>,
	pub image_url: Option<String>,
	pub store_name: Option<String>,
	pub stock: Option<u64>,
}

impl ProductPatch {
	pub fn validate(&self) -> Result<(), String> {
		match self.price {
			Some(price) if price < Decimal::ZERO => {
				Err("Price must not be negative".into())
			},
			_ => Ok(()),
		}
	}
}
