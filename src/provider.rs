//! Provider selection and mock fallback policy.
//!
//! A dashboard request always yields a renderable [`Report`]: connected accounts go
//! through the live pipeline, everything else (not connected, no property selected,
//! any live failure) degrades to deterministic sample data with a human-readable
//! explanation attached.

// self
use crate::{
	_prelude::*,
	obs::{self, StageKind, StageOutcome},
	report::{Ga4ReportBuilder, MockReportGenerator, RangeKey, Report},
};

const NO_PROPERTY_MESSAGE: &str =
	"GA4 is connected but no property is selected yet. Select a GA4 property in Settings.";

/// The data source chosen for one dashboard request.
#[derive(Debug)]
pub enum ReportProvider {
	/// Live pipeline, used while an account is connected.
	Ga4 {
		/// Report builder over the shared client and cache.
		builder: Ga4ReportBuilder,
		/// Selected property resource name; empty when none has been picked yet.
		property_id: String,
	},
	/// Sample data, used while disconnected.
	Mock(MockReportGenerator),
}
impl ReportProvider {
	/// Produces a report, falling back to sample data instead of surfacing errors.
	pub async fn report(&self, range: RangeKey, force_refresh: bool) -> Report {
		match self {
			Self::Mock(generator) => generator.report(range, None),
			Self::Ga4 { builder, property_id } => {
				if property_id.trim().is_empty() {
					obs::record_stage_outcome(StageKind::Report, StageOutcome::Fallback);

					return MockReportGenerator
						.report(range, Some(NO_PROPERTY_MESSAGE.into()));
				}

				match builder.report(property_id, range, force_refresh).await {
					Ok(report) => report,
					Err(e) => {
						obs::record_stage_outcome(StageKind::Report, StageOutcome::Fallback);

						MockReportGenerator.report(range, Some(e.to_string()))
					},
				}
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::report::ReportSource;

	#[tokio::test]
	async fn mock_provider_serves_sample_data_without_a_message() {
		let provider = ReportProvider::Mock(MockReportGenerator);
		let report = provider.report(RangeKey::Last7Days, false).await;

		assert_eq!(report.source, ReportSource::Mock);
		assert_eq!(report.timeseries.len(), 7);
		assert!(report.error_message.is_none());
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn connected_without_property_falls_back_with_guidance() {
		// crates.io
		use httpmock::MockServer;
		// self
		use crate::{
			auth::TokenManager,
			client::Ga4Client,
			config::{CacheConfig, Ga4Config},
			http::ReqwestHttpClient,
			report::CacheLayer,
			store::{MemorySettings, MemoryTransients},
		};

		let server = MockServer::start_async().await;
		let config = Arc::new(
			Ga4Config::new(
				Url::parse("https://example.test/callback")
					.expect("Redirect fixture should parse."),
			)
			.with_token_endpoint(
				Url::parse(&server.url("/token")).expect("Mock token URL should parse."),
			)
			.with_data_api_base(
				Url::parse(&server.base_url()).expect("Mock API base should parse."),
			),
		);
		let settings: Arc<dyn crate::store::SettingsStore> =
			Arc::new(MemorySettings::default());
		let http: Arc<dyn crate::http::HttpClient> = Arc::new(
			ReqwestHttpClient::new(&config).expect("Building the transport should succeed."),
		);
		let tokens = Arc::new(TokenManager::new(settings.clone(), http.clone(), config.clone()));
		let client = Ga4Client::new(http, tokens, config);
		let cache = CacheLayer::new(
			Arc::new(MemoryTransients::default()),
			settings,
			CacheConfig::default(),
		);
		let provider = ReportProvider::Ga4 {
			builder: Ga4ReportBuilder::new(client, cache),
			property_id: String::new(),
		};
		let report = provider.report(RangeKey::Last7Days, false).await;

		assert_eq!(report.source, ReportSource::Mock);
		assert_eq!(report.error_message.as_deref(), Some(NO_PROPERTY_MESSAGE));
	}
}
