//! Lifecycle management for the marketplace engine.
//!
//! Handles startup recovery of interrupted storage batches and the periodic
//! cleanup of expired storage entries.

use super::MarketEngine;
use crate::MarketError;
use std::time::Duration;
use tokio::task::JoinHandle;

impl MarketEngine {
	/// Performs any initialization required before serving requests.
	///
	/// Completes a storage batch a previous crash left unfinished.
	pub async fn initialize(&self) -> Result<(), MarketError> {
		tracing::info!(service_id = %self.config.service.id, "Initializing market engine");
		let replayed = self.storage.recover().await?;
		if replayed > 0 {
			tracing::warn!(entries = replayed, "Recovered interrupted storage batch");
		}
		Ok(())
	}

	/// Spawns the periodic storage cleanup task.
	pub fn spawn_cleanup_task(&self) -> JoinHandle<()> {
		let storage = self.storage.clone();
		let period = Duration::from_secs(self.config.storage.cleanup_interval_seconds);
		tokio::spawn(async move {
			let mut interval = tokio::time::interval(period);
			loop {
				interval.tick().await;
				match storage.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired entries", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		})
	}

	/// Performs cleanup operations
	pub async fn shutdown(&self) -> Result<(), MarketError> {
		tracing::info!("Shutting down market engine");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::test_utils::engine;

	#[tokio::test]
	async fn test_initialize_and_shutdown() {
		let engine = engine(false);
		engine.initialize().await.unwrap();
		engine.shutdown().await.unwrap();
	}

	#[tokio::test]
	async fn test_cleanup_task_can_be_aborted() {
		let engine = engine(false);
		let handle = engine.spawn_cleanup_task();
		handle.abort();
		assert!(handle.await.unwrap_err().is_cancelled());
	}
}
