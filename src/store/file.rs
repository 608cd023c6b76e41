//! Simple file-backed [`SettingsStore`] for hosts without a platform settings substrate.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::Credentials,
	store::{SettingsStore, StoreError, StoreFuture},
};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct FileSnapshot {
	credentials: Credentials,
	#[serde(default)]
	oauth_states: HashMap<String, String>,
	#[serde(default)]
	cache_index: Option<Vec<String>>,
}

/// Persists the settings record to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileSettings {
	path: PathBuf,
	inner: Arc<RwLock<FileSnapshot>>,
}
impl FileSettings {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot =
			if path.exists() { Self::load_snapshot(&path)? } else { FileSnapshot::default() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<FileSnapshot, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(FileSnapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, snapshot: &FileSnapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize settings snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn mutate<T>(
		&self,
		apply: impl FnOnce(&mut FileSnapshot) -> T,
	) -> Result<T, StoreError> {
		let mut guard = self.inner.write();
		let result = apply(&mut guard);

		self.persist_locked(&guard)?;

		Ok(result)
	}
}
impl SettingsStore for FileSettings {
	fn load(&self) -> StoreFuture<'_, Credentials> {
		Box::pin(async move { Ok(self.inner.read().credentials.clone()) })
	}

	fn save(&self, credentials: Credentials) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|snapshot| {
				snapshot.credentials = credentials;
			})
		})
	}

	fn oauth_state<'a>(&'a self, user: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.inner.read().oauth_states.get(user).cloned()) })
	}

	fn set_oauth_state<'a>(&'a self, user: &'a str, token: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(|snapshot| {
				snapshot.oauth_states.insert(user.to_owned(), token.to_owned());
			})
		})
	}

	fn delete_oauth_state<'a>(&'a self, user: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(|snapshot| {
				snapshot.oauth_states.remove(user);
			})
		})
	}

	fn cache_index(&self) -> StoreFuture<'_, Vec<String>> {
		Box::pin(async move { Ok(self.inner.read().cache_index.clone().unwrap_or_default()) })
	}

	fn save_cache_index(&self, keys: Vec<String>) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|snapshot| {
				snapshot.cache_index = Some(keys);
			})
		})
	}

	fn delete_cache_index(&self) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			self.mutate(|snapshot| {
				snapshot.cache_index = None;
			})
		})
	}
}
