//! Namespaces of the document store.

use std::str::FromStr;

/// Record namespaces. Keys are `<namespace>:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Directory entries, keyed by user id
	Users,
	/// Catalog products, keyed by product id
	Products,
	/// Shopping carts, keyed by owning user id
	Carts,
	/// Primary order records
	Orders,
	/// Delivery mirror of orders that reached "accepted"
	AcceptedOrders,
	/// Per-user list of placed order ids
	UserOrders,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Users => "users",
			StorageKey::Products => "products",
			StorageKey::Carts => "carts",
			StorageKey::Orders => "orders",
			StorageKey::AcceptedOrders => "accepted_orders",
			StorageKey::UserOrders => "user_orders",
		}
	}

	/// Returns an iterator over all StorageKey variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Users,
			Self::Products,
			Self::Carts,
			Self::Orders,
			Self::AcceptedOrders,
			Self::UserOrders,
		]
		.into_iter()
	}
}

impl FromStr for StorageKey {
	type Err = ();

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"users" => Ok(Self::Users),
			"products" => Ok(Self::Products),
			"carts" => Ok(Self::Carts),
			"orders" => Ok(Self::Orders),
			"accepted_orders" => Ok(Self::AcceptedOrders),
			"user_orders" => Ok(Self::UserOrders),
			_ => Err(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_storage_key_round_trips_through_str() {
		for key in StorageKey::all() {
			assert_eq!(key.as_str().parse::<StorageKey>(), Ok(key));
		}
		assert!("quotes".parse::<StorageKey>().is_err());
	}
}
