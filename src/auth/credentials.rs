//! Persisted credentials record and the redacted secret wrapper.

// self
use crate::{_prelude::*, error::ConfigError};

/// Redacted secret wrapper keeping tokens and client secrets out of logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(String);
impl Secret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Returns `true` when a non-blank value is stored.
	pub fn is_set(&self) -> bool {
		!self.0.trim().is_empty()
	}

	/// Blanks the stored value.
	pub fn clear(&mut self) {
		self.0.clear();
	}
}
impl From<&str> for Secret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl From<String> for Secret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl Debug for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("Secret").field(&"<redacted>").finish()
	}
}
impl Display for Secret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// The single persisted settings record for the GA4 connection.
///
/// Created empty at first use; mutated by the OAuth flow (connect, disconnect,
/// clear-secret) and by the token manager (refresh). `connected` being true implies a
/// refresh token or a still-valid access token exists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
	/// OAuth client identifier issued by Google Cloud Console.
	#[serde(default)]
	pub client_id: String,
	/// OAuth client secret.
	#[serde(default)]
	pub client_secret: Secret,
	/// Short-lived bearer token for the analytics APIs.
	#[serde(default)]
	pub access_token: Secret,
	/// Long-lived token used to mint new access tokens.
	#[serde(default)]
	pub refresh_token: Secret,
	/// Access token expiry as epoch seconds; zero when unset.
	#[serde(default)]
	pub expires_at: i64,
	/// Selected GA4 property resource name (e.g. `properties/123`).
	#[serde(default)]
	pub property_id: String,
	/// Connection flag persisted on successful connect or refresh.
	#[serde(default)]
	pub connected: bool,
	/// Marks an intentionally blanked client secret so the settings sanitizer does not
	/// treat the empty value as "unchanged".
	#[serde(default)]
	pub secret_cleared: bool,
}
impl Credentials {
	/// Buffer subtracted from token expiry checks to absorb clock skew.
	pub const EXPIRY_BUFFER_SECS: i64 = 60;

	/// Returns the trimmed client id or the config error naming it.
	pub fn require_client_id(&self) -> Result<&str, ConfigError> {
		let view = self.client_id.trim();

		if view.is_empty() { Err(ConfigError::MissingClientId) } else { Ok(view) }
	}

	/// Returns the client secret or the config error naming it.
	pub fn require_client_secret(&self) -> Result<&str, ConfigError> {
		let view = self.client_secret.expose().trim();

		if view.is_empty() { Err(ConfigError::MissingClientSecret) } else { Ok(view) }
	}

	/// Returns the trimmed property id, if one has been selected.
	pub fn property_id(&self) -> Option<&str> {
		let view = self.property_id.trim();

		(!view.is_empty()).then_some(view)
	}

	/// Returns the cached access token when it is still valid at `now` (epoch seconds),
	/// honoring the expiry buffer.
	pub fn live_access_token(&self, now: i64) -> Option<&str> {
		(self.access_token.is_set() && self.expires_at > now + Self::EXPIRY_BUFFER_SECS)
			.then(|| self.access_token.expose().trim())
	}

	/// Connection heuristic: the flag, else a refresh token, else token material with an
	/// expiry. The last arm is a deliberate leniency kept from the original design; a
	/// stale access token reads as connected until a refresh attempt fails.
	pub fn is_connected(&self) -> bool {
		if self.connected {
			return true;
		}
		if self.refresh_token.is_set() {
			return true;
		}

		self.access_token.is_set() && self.expires_at > 0
	}

	/// Clears connection state while preserving the OAuth app credentials.
	pub fn clear_connection(&mut self) {
		self.connected = false;
		self.refresh_token.clear();
		self.access_token.clear();
		self.expires_at = 0;
		self.property_id.clear();
	}
}
