//! Connect, callback, disconnect, and secret-hygiene flows.
//!
//! [`OAuthFlow::begin_connect`] issues a single-use CSRF state and builds the Google
//! consent URL; [`OAuthFlow::handle_callback`] validates that state, exchanges the
//! authorization code, and persists the tokens. State validation runs before the
//! provider's own `error` parameter is even looked at, so a forged callback cannot
//! inject messages.

// self
use crate::{
	_prelude::*,
	auth::{
		StateIssuer, constant_time_eq, parse_state,
		token::{self, GrantKind},
	},
	config::Ga4Config,
	error::{AuthError, ValidationError},
	http::HttpClient,
	obs::{self, StageKind, StageOutcome, StageSpan},
	store::SettingsStore,
};

const MAX_CODE_LEN: usize = 4_096;

/// Query parameters Google appends to the redirect URI.
#[derive(Clone, Debug, Default)]
pub struct CallbackParams {
	/// Round-tripped `state` value.
	pub state: Option<String>,
	/// Authorization code on success.
	pub code: Option<String>,
	/// Provider error code on denial (e.g. `access_denied`).
	pub error: Option<String>,
	/// Optional human-readable error detail.
	pub error_description: Option<String>,
}
impl CallbackParams {
	/// Extracts the relevant parameters from raw query pairs; unknown keys are
	/// ignored and the last occurrence of a duplicate wins.
	pub fn from_query_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
		let mut params = Self::default();

		for (key, value) in pairs {
			let value = value.trim();

			if value.is_empty() {
				continue;
			}

			match key {
				"state" => params.state = Some(value.to_owned()),
				"code" => params.code = Some(value.to_owned()),
				"error" => params.error = Some(value.to_owned()),
				"error_description" => params.error_description = Some(value.to_owned()),
				_ => {},
			}
		}

		params
	}
}

/// Drives the Authorization Code flow against the settings store.
pub struct OAuthFlow {
	settings: Arc<dyn SettingsStore>,
	http: Arc<dyn HttpClient>,
	config: Arc<Ga4Config>,
	state: StateIssuer,
}
impl OAuthFlow {
	/// Creates a flow with a fresh per-process state issuer.
	pub fn new(
		settings: Arc<dyn SettingsStore>,
		http: Arc<dyn HttpClient>,
		config: Arc<Ga4Config>,
	) -> Self {
		Self { settings, http, config, state: StateIssuer::new() }
	}

	/// Starts a connect flow for the user: stores a single-use state token and
	/// returns the consent URL to redirect to.
	///
	/// `access_type=offline` + `prompt=consent` together make Google return a refresh
	/// token even for repeat consents.
	pub async fn begin_connect(&self, user: &str) -> Result<Url> {
		let credentials = self.settings.load().await?;
		let client_id = credentials.require_client_id()?;
		let issued = self.state.issue(user);

		self.settings.set_oauth_state(user, &issued.token).await?;

		let mut url = self.config.authorization_endpoint.clone();

		url.query_pairs_mut()
			.append_pair("client_id", client_id)
			.append_pair("redirect_uri", self.config.redirect_uri.as_str())
			.append_pair("response_type", "code")
			.append_pair("access_type", "offline")
			.append_pair("prompt", "consent")
			.append_pair("scope", &self.config.scope_string())
			.append_pair("state", &issued.state);

		Ok(url)
	}

	/// Completes the callback: validates state, surfaces provider errors, exchanges
	/// the code, and persists the rotated credentials.
	pub async fn handle_callback(&self, user: &str, params: &CallbackParams) -> Result<()> {
		let state = params.state.as_deref().map(str::trim).unwrap_or_default();
		let stored = self.settings.oauth_state(user).await?.unwrap_or_default();

		if state.is_empty() || stored.is_empty() {
			return Err(ValidationError::MissingState.into());
		}

		let (nonce, token) = parse_state(state)?;

		if !self.state.verify_nonce(user, nonce) || !constant_time_eq(&stored, token) {
			return Err(ValidationError::InvalidState.into());
		}

		// The state held up; burn it so the callback cannot be replayed.
		self.settings.delete_oauth_state(user).await?;

		if let Some(error) = params.error.as_deref() {
			return Err(ValidationError::Provider {
				code: error.to_owned(),
				description: params.error_description.clone(),
			}
			.into());
		}

		let code = params.code.as_deref().map(str::trim).unwrap_or_default();

		if code.is_empty() {
			return Err(ValidationError::MissingCode.into());
		}
		// Codes are opaque; only length and control characters are worth rejecting.
		if code.len() > MAX_CODE_LEN || code.chars().any(|c| c.is_ascii_control()) {
			return Err(ValidationError::InvalidCode.into());
		}

		const KIND: StageKind = StageKind::CodeExchange;

		let span = StageSpan::new(KIND, "handle_callback");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		let result = span.instrument(self.exchange_and_persist(code)).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(KIND, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(KIND, StageOutcome::Failure),
		}

		result
	}

	async fn exchange_and_persist(&self, code: &str) -> Result<()> {
		let mut credentials = self.settings.load().await?;
		let client_id = credentials.require_client_id()?.to_owned();
		let client_secret = credentials.require_client_secret()?.to_owned();
		let form = [
			("code", code.to_owned()),
			("client_id", client_id),
			("client_secret", client_secret),
			("redirect_uri", self.config.redirect_uri.to_string()),
			("grant_type", GrantKind::AuthorizationCode.as_str().to_owned()),
		];
		let grant = token::request_grant(
			self.http.as_ref(),
			&self.config,
			GrantKind::AuthorizationCode,
			&form,
		)
		.await?;

		// Google only returns a refresh token on the first consent; a repeat consent
		// without one is fine as long as a previous one is still stored.
		if grant.refresh_token.is_none() && !credentials.refresh_token.is_set() {
			return Err(AuthError::MissingRefreshToken.into());
		}

		credentials.access_token = grant.access_token.into();
		credentials.expires_at = grant.expires_at;

		if let Some(refresh_token) = grant.refresh_token {
			credentials.refresh_token = refresh_token.into();
		}

		credentials.connected = true;

		self.settings.save(credentials).await?;

		Ok(())
	}

	/// Disconnects the account: tokens, the selected property, and the connected flag
	/// are cleared; the client id and secret stay.
	pub async fn disconnect(&self) -> Result<()> {
		let mut credentials = self.settings.load().await?;

		credentials.clear_connection();

		self.settings.save(credentials).await?;

		Ok(())
	}

	/// Disconnects and additionally blanks the stored client secret, marking the
	/// record so the UI can tell an intentionally cleared secret from a missing one.
	pub async fn clear_secret(&self) -> Result<()> {
		let mut credentials = self.settings.load().await?;

		credentials.clear_connection();
		credentials.client_secret.clear();
		credentials.secret_cleared = true;

		self.settings.save(credentials).await?;

		Ok(())
	}
}
impl Debug for OAuthFlow {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthFlow").field("config", &self.config).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn callback_params_parse_from_query_pairs() {
		let params = CallbackParams::from_query_pairs([
			("state", "nonce.token"),
			("code", "4/abc"),
			("error", ""),
			("extra", "ignored"),
		]);

		assert_eq!(params.state.as_deref(), Some("nonce.token"));
		assert_eq!(params.code.as_deref(), Some("4/abc"));
		assert!(params.error.is_none());
		assert!(params.error_description.is_none());
	}
}
