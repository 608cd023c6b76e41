//! Access token lifecycle: reuse, single-flighted refresh, and grant requests.
//!
//! [`TokenManager::valid_access_token`] returns the cached token untouched while more
//! than the expiry buffer remains, and otherwise performs a `grant_type=refresh_token`
//! exchange. Refreshes are serialized behind an async mutex so concurrent requests
//! collapse into one provider call; a caller that just saw its token rejected passes
//! that token as `stale` so the guard can hand back an already-rotated replacement
//! without another network round trip.

// self
use crate::{
	_prelude::*,
	auth::Credentials,
	config::Ga4Config,
	error::AuthError,
	http::HttpClient,
	obs::{self, StageKind, StageOutcome, StageSpan},
	store::SettingsStore,
};

const DEFAULT_EXPIRES_IN_SECS: i64 = 3_600;

/// Grant kinds submitted to the token endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GrantKind {
	/// `grant_type=authorization_code` during the connect callback.
	AuthorizationCode,
	/// `grant_type=refresh_token` during token refresh.
	RefreshToken,
}
impl GrantKind {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			GrantKind::AuthorizationCode => "authorization_code",
			GrantKind::RefreshToken => "refresh_token",
		}
	}
}

/// Parsed outcome of a successful token-endpoint grant.
#[derive(Clone, Debug)]
pub(crate) struct TokenGrant {
	pub access_token: String,
	pub refresh_token: Option<String>,
	/// Epoch seconds; already buffered against clock skew.
	pub expires_at: i64,
}

#[derive(Deserialize)]
struct TokenEndpointBody {
	access_token: Option<String>,
	expires_in: Option<i64>,
	refresh_token: Option<String>,
}

/// Obtains valid access tokens, refreshing them when needed.
pub struct TokenManager {
	settings: Arc<dyn SettingsStore>,
	http: Arc<dyn HttpClient>,
	config: Arc<Ga4Config>,
	refresh_guard: AsyncMutex<()>,
}
impl TokenManager {
	/// Creates a manager over the provided stores and transport.
	pub fn new(
		settings: Arc<dyn SettingsStore>,
		http: Arc<dyn HttpClient>,
		config: Arc<Ga4Config>,
	) -> Self {
		Self { settings, http, config, refresh_guard: AsyncMutex::new(()) }
	}

	/// Returns a valid access token, reusing the cached one when more than the expiry
	/// buffer remains and refreshing otherwise. Reuse never touches the network.
	pub async fn valid_access_token(&self) -> Result<String> {
		let credentials = self.settings.load().await?;
		let now = OffsetDateTime::now_utc().unix_timestamp();

		if let Some(token) = credentials.live_access_token(now) {
			return Ok(token.to_owned());
		}

		self.refresh_access_token(Some(credentials.access_token.expose())).await
	}

	/// Performs a refresh-token grant and persists the rotated access token.
	///
	/// `stale` is the access token the caller last observed (expired or rejected with a
	/// 401); when another request already rotated past it, the fresh token is returned
	/// without contacting the provider.
	pub async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String> {
		const KIND: StageKind = StageKind::TokenRefresh;

		let span = StageSpan::new(KIND, "refresh_access_token");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		let result = span
			.instrument(async move {
				let _singleflight = self.refresh_guard.lock().await;
				let mut credentials = self.settings.load().await?;
				let now = OffsetDateTime::now_utc().unix_timestamp();

				if let Some(token) = credentials.live_access_token(now)
					&& stale.is_some_and(|stale| stale != token)
				{
					return Ok(token.to_owned());
				}
				if !credentials.refresh_token.is_set() {
					return Err(AuthError::MissingRefreshToken.into());
				}

				let client_id = credentials.require_client_id()?.to_owned();
				let client_secret = credentials.require_client_secret()?.to_owned();
				let refresh_token = credentials.refresh_token.expose().trim().to_owned();
				let form = [
					("client_id", client_id),
					("client_secret", client_secret),
					("refresh_token", refresh_token),
					("grant_type", GrantKind::RefreshToken.as_str().to_owned()),
				];
				let grant = request_grant(
					self.http.as_ref(),
					&self.config,
					GrantKind::RefreshToken,
					&form,
				)
				.await?;

				credentials.access_token = grant.access_token.clone().into();
				credentials.expires_at = grant.expires_at;
				credentials.connected = true;

				self.settings.save(credentials).await?;

				Ok(grant.access_token)
			})
			.await;

		match &result {
			Ok(_) => obs::record_stage_outcome(KIND, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(KIND, StageOutcome::Failure),
		}

		result
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager").field("config", &self.config).finish()
	}
}

/// Submits a grant to the token endpoint and maps the response.
///
/// Non-200 responses reporting `invalid_grant` become [`AuthError::TokenRevoked`] for
/// refreshes; other failures carry the provider's error + description. A 200 response
/// is parsed strictly, and the returned expiry is `now + max(60, expires_in - 60)`.
pub(crate) async fn request_grant(
	http: &dyn HttpClient,
	config: &Ga4Config,
	kind: GrantKind,
	form: &[(&'static str, String)],
) -> Result<TokenGrant> {
	let response = http.post_form(config.token_endpoint.clone(), form).await?;

	if response.status != 200 {
		let (error, description) = decode_error_fields(&response.body);

		if kind == GrantKind::RefreshToken && error.as_deref() == Some("invalid_grant") {
			return Err(AuthError::TokenRevoked.into());
		}

		let mut message = error.unwrap_or_else(|| format!("status {}", response.status));

		if let Some(description) = description {
			message.push_str(" - ");
			message.push_str(&description);
		}

		return Err(match kind {
			GrantKind::AuthorizationCode => AuthError::ExchangeFailed { message },
			GrantKind::RefreshToken => AuthError::RefreshFailed { message },
		}
		.into());
	}

	let deserializer = &mut serde_json::Deserializer::from_slice(&response.body);
	let body: TokenEndpointBody =
		serde_path_to_error::deserialize(deserializer).map_err(|source| {
			AuthError::InvalidTokenResponse { source, status: response.status }
		})?;
	let access_token = body
		.access_token
		.map(|token| token.trim().to_owned())
		.filter(|token| !token.is_empty())
		.ok_or(AuthError::MissingAccessToken)?;
	let expires_in = body.expires_in.filter(|secs| *secs > 0).unwrap_or(DEFAULT_EXPIRES_IN_SECS);
	let refresh_token = body
		.refresh_token
		.map(|token| token.trim().to_owned())
		.filter(|token| !token.is_empty());
	let now = OffsetDateTime::now_utc().unix_timestamp();

	Ok(TokenGrant {
		access_token,
		refresh_token,
		expires_at: now + (expires_in - Credentials::EXPIRY_BUFFER_SECS)
			.max(Credentials::EXPIRY_BUFFER_SECS),
	})
}

fn decode_error_fields(body: &[u8]) -> (Option<String>, Option<String>) {
	let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
		return (None, None);
	};
	let field = |name: &str| {
		value
			.get(name)
			.and_then(serde_json::Value::as_str)
			.map(str::trim)
			.filter(|view| !view.is_empty())
			.map(str::to_owned)
	};

	(field("error"), field("error_description"))
}
