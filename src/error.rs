//! Crate-level error taxonomy shared by the token manager, API client, and report pipeline.
//!
//! Callers branch on the category, never on raw HTTP codes: [`ConfigError`] is user-fixable
//! via settings, [`AuthError`] requires a reconnect, [`TransportError`] is transient,
//! [`ApiError`] carries provider detail, and [`ValidationError`] marks a failed OAuth
//! callback attempt.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(#[from] crate::store::StoreError),
	/// Local configuration problem (missing client id/secret/property).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token lifecycle failure; usually requires reconnecting the Google account.
	#[error(transparent)]
	Auth(#[from] AuthError),
	/// Transport failure (DNS, TCP, TLS) reaching Google.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Google rejected an API request.
	#[error(transparent)]
	Api(#[from] ApiError),
	/// Malformed or replayed OAuth callback.
	#[error(transparent)]
	Validation(#[from] ValidationError),
}

/// Configuration failures the site owner can fix from the settings screen.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// OAuth client id has not been configured.
	#[error("Missing OAuth client id.")]
	MissingClientId,
	/// OAuth client secret has not been configured.
	#[error("Missing OAuth client secret.")]
	MissingClientSecret,
	/// No GA4 property resource name has been selected.
	#[error("Missing GA4 property id.")]
	MissingPropertyId,
	/// An endpoint or request URL could not be assembled.
	#[error("Invalid endpoint URL.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
impl From<url::ParseError> for ConfigError {
	fn from(source: url::ParseError) -> Self {
		Self::InvalidEndpoint { source }
	}
}

/// Token lifecycle failures raised by the token manager and OAuth flow.
#[derive(Debug, ThisError)]
pub enum AuthError {
	/// No refresh token is stored; the account must be reconnected.
	#[error("Missing refresh token; reconnect Google Analytics.")]
	MissingRefreshToken,
	/// Token endpoint response omitted `access_token`.
	#[error("Token response is missing access_token.")]
	MissingAccessToken,
	/// Provider reported `invalid_grant`; the stored grant has been revoked.
	#[error("Google revoked the token (invalid_grant); reconnect Google Analytics.")]
	TokenRevoked,
	/// Refresh-token grant failed with a provider message.
	#[error("Token refresh failed: {message}.")]
	RefreshFailed {
		/// Provider-supplied error plus optional description.
		message: String,
	},
	/// Authorization-code exchange failed with a provider message.
	#[error("Authorization code exchange failed: {message}.")]
	ExchangeFailed {
		/// Provider-supplied error plus optional description.
		message: String,
	},
	/// Token endpoint returned JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	InvalidTokenResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code of the offending response.
		status: u16,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling Google.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling Google.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Stable taxonomy for Google API rejections.
///
/// The `detail` strings are pre-truncated, human-readable summaries lifted from the
/// provider payload; they may be empty when Google returned no message.
#[derive(Debug, ThisError)]
pub enum ApiError {
	/// 403 or `PERMISSION_DENIED`.
	#[error(
		"Permission denied by the Google Analytics API; reconnect and verify property access.{detail}"
	)]
	PermissionDenied {
		/// Provider detail, formatted for display.
		detail: String,
	},
	/// 404 or `NOT_FOUND`.
	#[error("GA4 property not found; select a valid property and try again.{detail}")]
	NotFound {
		/// Provider detail, formatted for display.
		detail: String,
	},
	/// 429 or `RESOURCE_EXHAUSTED`.
	#[error("Google API quota exceeded; try again later.{detail}")]
	QuotaExceeded {
		/// Provider detail, formatted for display.
		detail: String,
	},
	/// Any other non-success response.
	#[error("Google API request failed.{detail}")]
	Failed {
		/// Provider detail, formatted for display.
		detail: String,
	},
	/// Response body was not valid JSON.
	#[error("Invalid API response from Google (status {status}).")]
	InvalidResponse {
		/// HTTP status code of the offending response.
		status: u16,
	},
}

/// Malformed OAuth callback; the user simply retries the connect flow.
#[derive(Debug, ThisError)]
pub enum ValidationError {
	/// Callback carried no state, or no state was stored for the user.
	#[error("OAuth state is missing or was already used.")]
	MissingState,
	/// State did not split into the expected `nonce.token` shape.
	#[error("OAuth state is malformed.")]
	MalformedState,
	/// Nonce or per-user token did not verify.
	#[error("OAuth state failed verification.")]
	InvalidState,
	/// Callback carried no authorization code.
	#[error("Missing authorization code.")]
	MissingCode,
	/// Authorization code failed the opaque-token plausibility check.
	#[error("Authorization code is not a plausible opaque token.")]
	InvalidCode,
	/// Provider redirected back with an explicit error.
	#[error("Google reported an OAuth error: {code}{}.", fmt_description(.description))]
	Provider {
		/// Provider error code (e.g. `access_denied`).
		code: String,
		/// Optional provider error description.
		description: Option<String>,
	},
}

fn fmt_description(description: &Option<String>) -> String {
	description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default()
}
