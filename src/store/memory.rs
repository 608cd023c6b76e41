//! Thread-safe in-memory stores for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::Credentials,
	store::{SettingsStore, StoreError, StoreFuture, TransientStore},
};

#[derive(Debug, Default)]
struct SettingsState {
	credentials: Credentials,
	oauth_states: HashMap<String, String>,
	cache_index: Option<Vec<String>>,
}

/// In-process [`SettingsStore`] used by tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemorySettings(Arc<RwLock<SettingsState>>);
impl MemorySettings {
	/// Creates a store seeded with the provided credentials record.
	pub fn with_credentials(credentials: Credentials) -> Self {
		let store = Self::default();

		store.0.write().credentials = credentials;

		store
	}

	/// Returns a snapshot of the current credentials record.
	pub fn snapshot(&self) -> Credentials {
		self.0.read().credentials.clone()
	}
}
impl SettingsStore for MemorySettings {
	fn load(&self) -> StoreFuture<'_, Credentials> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().credentials.clone()) })
	}

	fn save(&self, credentials: Credentials) -> StoreFuture<'_, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			state.write().credentials = credentials;

			Ok(())
		})
	}

	fn oauth_state<'a>(&'a self, user: &'a str) -> StoreFuture<'a, Option<String>> {
		let state = self.0.clone();
		let user = user.to_owned();

		Box::pin(async move { Ok(state.read().oauth_states.get(&user).cloned()) })
	}

	fn set_oauth_state<'a>(&'a self, user: &'a str, token: &'a str) -> StoreFuture<'a, ()> {
		let state = self.0.clone();
		let user = user.to_owned();
		let token = token.to_owned();

		Box::pin(async move {
			state.write().oauth_states.insert(user, token);

			Ok(())
		})
	}

	fn delete_oauth_state<'a>(&'a self, user: &'a str) -> StoreFuture<'a, ()> {
		let state = self.0.clone();
		let user = user.to_owned();

		Box::pin(async move {
			state.write().oauth_states.remove(&user);

			Ok(())
		})
	}

	fn cache_index(&self) -> StoreFuture<'_, Vec<String>> {
		let state = self.0.clone();

		Box::pin(async move { Ok(state.read().cache_index.clone().unwrap_or_default()) })
	}

	fn save_cache_index(&self, keys: Vec<String>) -> StoreFuture<'_, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			state.write().cache_index = Some(keys);

			Ok(())
		})
	}

	fn delete_cache_index(&self) -> StoreFuture<'_, ()> {
		let state = self.0.clone();

		Box::pin(async move {
			state.write().cache_index = None;

			Ok(())
		})
	}
}

#[derive(Clone, Debug)]
struct TransientEntry {
	value: String,
	expires_at: OffsetDateTime,
}

/// In-process [`TransientStore`] with lazy expiry eviction.
#[derive(Clone, Debug, Default)]
pub struct MemoryTransients(Arc<RwLock<HashMap<String, TransientEntry>>>);
impl MemoryTransients {
	/// Returns the number of live (non-expired) entries.
	pub fn len(&self) -> usize {
		let now = OffsetDateTime::now_utc();

		self.0.read().values().filter(|entry| entry.expires_at > now).count()
	}

	/// Returns `true` when no live entries remain.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
impl TransientStore for MemoryTransients {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			let mut guard = map.write();
			let live = match guard.get(&key) {
				Some(entry) if entry.expires_at > OffsetDateTime::now_utc() =>
					Some(entry.value.clone()),
				Some(_) => {
					guard.remove(&key);

					None
				},
				None => None,
			};

			Ok::<_, StoreError>(live)
		})
	}

	fn set<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			let expires_at = OffsetDateTime::now_utc() + ttl;

			map.write().insert(key, TransientEntry { value, expires_at });

			Ok(())
		})
	}

	fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let key = key.to_owned();

		Box::pin(async move {
			map.write().remove(&key);

			Ok(())
		})
	}
}
