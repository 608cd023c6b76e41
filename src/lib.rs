//! GA4 reporting core—OAuth token lifecycle, authenticated report fetching, cache-backed
//! report documents, and a deterministic mock fallback in one embeddable crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod flows;
pub mod http;
pub mod obs;
pub mod provider;
pub mod report;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience fixtures for integration tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::Credentials,
		config::{CacheConfig, Ga4Config},
		dashboard::Dashboard,
		http::ReqwestHttpClient,
		store::{MemorySettings, MemoryTransients},
	};

	/// Builds a config pointing every Google endpoint at a mock server base URL.
	pub fn test_config(server_base: &str) -> Ga4Config {
		let base = Url::parse(server_base).expect("Mock server URL should parse.");
		let join = |path: &str| base.join(path).expect("Mock endpoint URL should join.");

		Ga4Config::new(join("callback"))
			.with_authorization_endpoint(join("auth"))
			.with_token_endpoint(join("token"))
			.with_admin_api_base(join("admin"))
			.with_data_api_base(join("data"))
	}

	/// Credentials fixture for an account that counts as connected, with a far-future
	/// access token expiry.
	pub fn connected_credentials() -> Credentials {
		Credentials {
			client_id: "client-id".into(),
			client_secret: "client-secret".into(),
			access_token: "live-access-token".into(),
			refresh_token: "refresh-token".into(),
			expires_at: OffsetDateTime::now_utc().unix_timestamp() + 3_600,
			property_id: "properties/123".into(),
			connected: true,
			secret_cleared: false,
		}
	}

	/// Constructs a [`Dashboard`] over in-memory stores and the reqwest transport,
	/// returning the stores for inspection.
	pub fn build_test_dashboard(
		config: Ga4Config,
		credentials: Credentials,
	) -> (Dashboard, Arc<MemorySettings>, Arc<MemoryTransients>) {
		let settings = Arc::new(MemorySettings::with_credentials(credentials));
		let transients = Arc::new(MemoryTransients::default());
		let http = Arc::new(
			ReqwestHttpClient::new(&config).expect("Failed to build test transport."),
		);
		let dashboard = Dashboard::new(
			settings.clone(),
			transients.clone(),
			http,
			config,
			CacheConfig::default(),
		);

		(dashboard, settings, transients)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Date, Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use ga4_report_core as _;
#[cfg(test)] use httpmock as _;
