//! Identity directory.
//!
//! Users are looked up by key; role checks never scan the namespace.

use crate::MarketError;
use market_storage::{StorageService, Transaction, Versioned};
use market_types::{ProfileUpdate, StorageKey, User, UserRole};
use std::sync::Arc;

pub struct Directory {
	storage: Arc<StorageService>,
}

impl Directory {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Registers a new user under a fresh UUID.
	pub async fn create_user(&self, user_type: &str) -> Result<User, MarketError> {
		let role: UserRole = user_type.parse().map_err(MarketError::InvalidInput)?;
		let user = User::new(uuid::Uuid::new_v4().to_string(), role);

		let mut tx = Transaction::new();
		tx.insert(StorageKey::Users.as_str(), &user.user_id, &user)?;
		self.storage.commit(tx).await?;

		tracing::info!(user_id = %user.user_id, role = %role, "User created");
		Ok(user)
	}

	pub async fn get_user(&self, user_id: &str) -> Result<User, MarketError> {
		Ok(self.load_user(user_id).await?.value)
	}

	/// Lists every directory entry, ordered by id.
	pub async fn list_users(&self) -> Result<Vec<User>, MarketError> {
		let users: Vec<User> = self.storage.list(StorageKey::Users.as_str()).await?;
		if users.is_empty() {
			return Err(MarketError::NoResults("No users found".into()));
		}
		Ok(users)
	}

	/// Loads a user together with its revision for a guarded write.
	pub async fn load_user(&self, user_id: &str) -> Result<Versioned<User>, MarketError> {
		let (user, revision) = self
			.storage
			.load_optional::<User>(StorageKey::Users.as_str(), user_id)
			.await?;
		match user {
			Some(value) => Ok(Versioned { value, revision }),
			None => Err(MarketError::UserNotFound(user_id.to_string())),
		}
	}

	/// Loads a user that must act in `role`.
	///
	/// Unknown users and users with another role are both `Unauthorized`.
	pub async fn require_role(
		&self,
		user_id: &str,
		role: UserRole,
	) -> Result<Versioned<User>, MarketError> {
		match self.load_user(user_id).await {
			Ok(user) if user.value.has_role(role) => Ok(user),
			Ok(_) | Err(MarketError::UserNotFound(_)) => Err(MarketError::Unauthorized(format!(
				"{} is not a known {}",
				user_id, role
			))),
			Err(e) => Err(e),
		}
	}

	/// Applies a profile update to a loaded user and stages the guarded write.
	pub fn stage_profile(
		&self,
		tx: &mut Transaction,
		user: Versioned<User>,
		update: ProfileUpdate,
	) -> Result<User, MarketError> {
		let Versioned {
			value: mut updated,
			revision,
		} = user;
		update.apply(&mut updated);
		tx.put(StorageKey::Users.as_str(), &updated.user_id, &updated, &revision)?;
		Ok(updated)
	}

	/// Partially updates the rider profile of a user.
	pub async fn update_profile(
		&self,
		user_id: &str,
		update: ProfileUpdate,
	) -> Result<User, MarketError> {
		let user = self.load_user(user_id).await?;
		let mut tx = Transaction::new();
		let updated = self.stage_profile(&mut tx, user, update)?;
		self.storage.commit(tx).await?;
		Ok(updated)
	}
}
