//! Directory entry types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Role a directory entry acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
	Customer,
	Rider,
	StoreOwner,
}

impl UserRole {
	pub fn as_str(&self) -> &'static str {
		match self {
			UserRole::Customer => "customer",
			UserRole::Rider => "rider",
			UserRole::StoreOwner => "store_owner",
		}
	}
}

impl fmt::Display for UserRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for UserRole {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"customer" => Ok(Self::Customer),
			"rider" => Ok(Self::Rider),
			"store_owner" => Ok(Self::StoreOwner),
			other => Err(format!(
				"Invalid user type '{}': expected customer, rider or store_owner",
				other
			)),
		}
	}
}

/// A directory entry.
///
/// The assigned/completed sets make up the rider profile and stay empty for
/// other roles. They are only written by the delivery transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
	pub user_id: String,
	pub user_type: UserRole,
	#[serde(default)]
	pub assigned_orders: BTreeSet<String>,
	#[serde(default)]
	pub completed_orders: BTreeSet<String>,
}

impl User {
	pub fn new(user_id: String, user_type: UserRole) -> Self {
		Self {
			user_id,
			user_type,
			assigned_orders: BTreeSet::new(),
			completed_orders: BTreeSet::new(),
		}
	}

	pub fn has_role(&self, role: UserRole) -> bool {
		self.user_type == role
	}
}

/// Partial update of a rider profile; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
	pub assigned_orders: Option<BTreeSet<String>>,
	pub completed_orders: Option<BTreeSet<String>>,
}

impl ProfileUpdate {
	pub fn apply(self, user: &mut User) {
		if let Some(assigned) = self.assigned_orders {
			user.assigned_orders = assigned;
		}
		if let Some(completed) = self.completed_orders {
			user.completed_orders = completed;
		}
	}
}
