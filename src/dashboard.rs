//! Composition root tying stores, transport, auth, and providers together.
//!
//! [`Dashboard`] is the only type most embedders touch: construct one per tenant with
//! the stores and transport of your platform, then call the flow and report methods.
//! Report methods never fail; anything that prevents live data degrades into sample
//! data with an explanation attached.

// self
use crate::{
	_prelude::*,
	auth::TokenManager,
	client::{Ga4Client, PropertySummary},
	config::{CacheConfig, Ga4Config},
	flows::{CallbackParams, OAuthFlow},
	http::HttpClient,
	obs::{self, StageKind, StageOutcome},
	provider::ReportProvider,
	report::{CacheLayer, Ga4ReportBuilder, MockReportGenerator, RangeKey, Report},
	store::{SettingsStore, TransientStore},
};

/// One tenant's fully wired data-access stack.
pub struct Dashboard {
	settings: Arc<dyn SettingsStore>,
	transients: Arc<dyn TransientStore>,
	http: Arc<dyn HttpClient>,
	config: Arc<Ga4Config>,
	cache_config: CacheConfig,
	tokens: Arc<TokenManager>,
	flow: OAuthFlow,
}
impl Dashboard {
	/// Wires a dashboard from the given stores, transport, and configuration.
	pub fn new(
		settings: Arc<dyn SettingsStore>,
		transients: Arc<dyn TransientStore>,
		http: Arc<dyn HttpClient>,
		config: Ga4Config,
		cache_config: CacheConfig,
	) -> Self {
		let config = Arc::new(config);
		let tokens = Arc::new(TokenManager::new(settings.clone(), http.clone(), config.clone()));
		let flow = OAuthFlow::new(settings.clone(), http.clone(), config.clone());

		Self { settings, transients, http, config, cache_config, tokens, flow }
	}

	/// Wires a dashboard with the builtin reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn with_default_transport(
		settings: Arc<dyn SettingsStore>,
		transients: Arc<dyn TransientStore>,
		config: Ga4Config,
		cache_config: CacheConfig,
	) -> Result<Self> {
		let http = Arc::new(crate::http::ReqwestHttpClient::new(&config)?);

		Ok(Self::new(settings, transients, http, config, cache_config))
	}

	/// Whether an account currently counts as connected.
	pub async fn is_connected(&self) -> Result<bool> {
		Ok(self.settings.load().await?.is_connected())
	}

	/// Produces a report for the range key, serving a live cache entry when one
	/// exists. Unknown range keys fall back to the seven-day window.
	pub async fn report(&self, range_key: &str) -> Report {
		self.report_inner(range_key, false).await
	}

	/// Produces a report for the range key, bypassing the cache (the fresh result is
	/// still written back).
	pub async fn report_refreshed(&self, range_key: &str) -> Report {
		self.report_inner(range_key, true).await
	}

	async fn report_inner(&self, range_key: &str, force_refresh: bool) -> Report {
		let range = RangeKey::from_key(range_key);
		let credentials = match self.settings.load().await {
			Ok(credentials) => credentials,
			Err(e) => {
				obs::record_stage_outcome(StageKind::Report, StageOutcome::Fallback);

				return MockReportGenerator.report(range, Some(e.to_string()));
			},
		};
		let provider = if credentials.is_connected() {
			ReportProvider::Ga4 {
				builder: self.report_builder(),
				property_id: credentials.property_id().unwrap_or_default().to_owned(),
			}
		} else {
			ReportProvider::Mock(MockReportGenerator)
		};

		provider.report(range, force_refresh).await
	}

	/// Deletes every cached report recorded in the index; returns the count.
	pub async fn clear_all_cache(&self) -> Result<usize> {
		self.cache_layer().clear_all().await
	}

	/// Lists the GA4 properties the connected account can read.
	pub async fn list_properties(&self) -> Result<Vec<PropertySummary>> {
		self.client().list_properties().await
	}

	/// Starts a connect flow; returns the consent URL to redirect the user to.
	pub async fn begin_connect(&self, user: &str) -> Result<Url> {
		self.flow.begin_connect(user).await
	}

	/// Completes the OAuth callback for the user.
	pub async fn handle_callback(&self, user: &str, params: &CallbackParams) -> Result<()> {
		self.flow.handle_callback(user, params).await
	}

	/// Disconnects the account, keeping the stored app credentials.
	pub async fn disconnect(&self) -> Result<()> {
		self.flow.disconnect().await
	}

	/// Disconnects and blanks the stored client secret.
	pub async fn clear_secret(&self) -> Result<()> {
		self.flow.clear_secret().await
	}

	fn client(&self) -> Ga4Client {
		Ga4Client::new(self.http.clone(), self.tokens.clone(), self.config.clone())
	}

	fn cache_layer(&self) -> CacheLayer {
		CacheLayer::new(self.transients.clone(), self.settings.clone(), self.cache_config.clone())
	}

	fn report_builder(&self) -> Ga4ReportBuilder {
		Ga4ReportBuilder::new(self.client(), self.cache_layer())
	}
}
impl Debug for Dashboard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dashboard")
			.field("config", &self.config)
			.field("cache_config", &self.cache_config)
			.finish()
	}
}
