//! Storage contracts for the settings record, OAuth state, cache index, and transients.
//!
//! The hosting platform's key-value substrate offers no transactional guarantees and no
//! key enumeration; both traits here model exactly that. The cache index (a plain list
//! of live transient keys kept in the settings store) exists only because
//! [`TransientStore`] cannot list keys, which bulk invalidation needs.

pub mod file;
pub mod memory;

pub use file::FileSettings;
pub use memory::{MemorySettings, MemoryTransients};

// self
use crate::{_prelude::*, auth::Credentials};

/// Boxed future returned by store trait methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for the single settings record plus its sidecar values.
pub trait SettingsStore
where
	Self: Send + Sync,
{
	/// Loads the credentials record, falling back to defaults when absent.
	fn load(&self) -> StoreFuture<'_, Credentials>;

	/// Persists the credentials record, replacing the previous one.
	fn save(&self, credentials: Credentials) -> StoreFuture<'_, ()>;

	/// Fetches the single-use OAuth state token stored for a user, if any.
	fn oauth_state<'a>(&'a self, user: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores (or replaces) the single-use OAuth state token for a user.
	fn set_oauth_state<'a>(&'a self, user: &'a str, token: &'a str) -> StoreFuture<'a, ()>;

	/// Deletes the OAuth state token for a user.
	fn delete_oauth_state<'a>(&'a self, user: &'a str) -> StoreFuture<'a, ()>;

	/// Returns the registered cache keys, empty when the index is absent.
	fn cache_index(&self) -> StoreFuture<'_, Vec<String>>;

	/// Replaces the cache index with the provided key list.
	fn save_cache_index(&self, keys: Vec<String>) -> StoreFuture<'_, ()>;

	/// Deletes the cache index record entirely.
	fn delete_cache_index(&self) -> StoreFuture<'_, ()>;
}

/// TTL'd key-value contract modeling the platform transient store.
///
/// Values are opaque serialized strings so the trait stays object safe; the cache
/// layer owns the serde boundary.
pub trait TransientStore
where
	Self: Send + Sync,
{
	/// Fetches a live value; expired entries read as `None`.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores a value that expires `ttl` from now. A non-positive `ttl` expires it
	/// immediately.
	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()>;

	/// Deletes a value; deleting an absent key is not an error.
	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`SettingsStore`] and [`TransientStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
