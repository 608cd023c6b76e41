//! Explicit configuration structs passed at construction time.
//!
//! The original design mutated behavior through a global filter bus; here every knob
//! (endpoints, scopes, cache policy) is plain data handed to the composition root.

// self
use crate::_prelude::*;

const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const ANALYTICS_ADMIN_API_BASE: &str = "https://analyticsadmin.googleapis.com/v1beta";
const ANALYTICS_DATA_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Endpoints, scopes, and transport policy for the Google side of the pipeline.
#[derive(Clone, Debug)]
pub struct Ga4Config {
	/// Consent screen URL for the Authorization Code flow.
	pub authorization_endpoint: Url,
	/// Token endpoint for code exchanges and refreshes.
	pub token_endpoint: Url,
	/// Analytics Admin API base (account/property listing).
	pub admin_api_base: Url,
	/// Analytics Data API base (report queries).
	pub data_api_base: Url,
	/// Redirect URI registered in Google Cloud Console.
	pub redirect_uri: Url,
	/// OAuth scopes requested on connect.
	pub scopes: Vec<String>,
	/// Per-request transport timeout.
	pub timeout: Duration,
}
impl Ga4Config {
	/// Creates a config pointing at the production Google endpoints.
	pub fn new(redirect_uri: Url) -> Self {
		Self {
			authorization_endpoint: Url::parse(GOOGLE_AUTHORIZATION_ENDPOINT)
				.expect("Builtin authorization endpoint is a valid URL."),
			token_endpoint: Url::parse(GOOGLE_TOKEN_ENDPOINT)
				.expect("Builtin token endpoint is a valid URL."),
			admin_api_base: Url::parse(ANALYTICS_ADMIN_API_BASE)
				.expect("Builtin admin API base is a valid URL."),
			data_api_base: Url::parse(ANALYTICS_DATA_API_BASE)
				.expect("Builtin data API base is a valid URL."),
			redirect_uri,
			scopes: vec![ANALYTICS_READONLY_SCOPE.into()],
			timeout: Duration::seconds(20),
		}
	}

	/// Overrides the authorization endpoint (tests, proxies).
	pub fn with_authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = url;

		self
	}

	/// Overrides the token endpoint.
	pub fn with_token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = url;

		self
	}

	/// Overrides the Admin API base.
	pub fn with_admin_api_base(mut self, url: Url) -> Self {
		self.admin_api_base = url;

		self
	}

	/// Overrides the Data API base.
	pub fn with_data_api_base(mut self, url: Url) -> Self {
		self.data_api_base = url;

		self
	}

	/// Appends extra OAuth scopes beyond read-only analytics.
	pub fn with_extra_scopes(mut self, scopes: impl IntoIterator<Item = String>) -> Self {
		self.scopes.extend(scopes);

		self
	}

	/// Space-joined scope string with blanks filtered out.
	pub fn scope_string(&self) -> String {
		self.scopes
			.iter()
			.map(|scope| scope.trim())
			.filter(|scope| !scope.is_empty())
			.collect::<Vec<_>>()
			.join(" ")
	}
}

/// Cache policy for assembled reports.
#[derive(Clone, Debug)]
pub struct CacheConfig {
	/// Disables all cache reads and writes when false.
	pub enabled: bool,
	/// Entry lifetime; floored at one minute when applied.
	pub ttl: Duration,
	/// Tenant (site) identifier folded into every cache key so a shared backing store
	/// never mixes sites.
	pub tenant: String,
}
impl CacheConfig {
	/// Lower bound applied to the configured TTL.
	pub const MIN_TTL: Duration = Duration::seconds(60);

	/// Returns the configured TTL clamped to the minimum.
	pub fn effective_ttl(&self) -> Duration {
		self.ttl.max(Self::MIN_TTL)
	}
}
impl Default for CacheConfig {
	fn default() -> Self {
		Self { enabled: true, ttl: Duration::minutes(15), tenant: "1".into() }
	}
}
