//! Transport abstraction for Google calls.
//!
//! [`HttpClient`] is the crate's only dependency on an HTTP stack: three request
//! shapes (bearer GET, form POST, bearer JSON POST) returning raw status + body so the
//! API client owns all decoding and error mapping. The default implementation wraps
//! reqwest behind the `reqwest` feature; tests and exotic hosts can substitute their
//! own transport.

// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::Ga4Config, error::ConfigError};

/// Boxed future returned by [`HttpClient`] methods.
pub type HttpFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Raw response surfaced to the API client.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Object-safe transport contract executing the three request shapes the pipeline
/// needs. Implementations must enforce a bounded per-request timeout.
pub trait HttpClient
where
	Self: Send + Sync,
{
	/// Executes a GET, attaching a Bearer token when provided.
	fn get<'a>(&'a self, url: Url, bearer: Option<&'a str>) -> HttpFuture<'a, RawResponse>;

	/// Executes a form-encoded POST (token endpoint grants).
	fn post_form<'a>(
		&'a self,
		url: Url,
		form: &'a [(&'static str, String)],
	) -> HttpFuture<'a, RawResponse>;

	/// Executes a JSON POST with a Bearer token (report queries).
	fn post_json<'a>(
		&'a self,
		url: Url,
		bearer: &'a str,
		body: &'a serde_json::Value,
	) -> HttpFuture<'a, RawResponse>;
}

/// Thin wrapper around [`ReqwestClient`] so shared transport policy lives in one place.
/// Redirect following is disabled: the token endpoint must answer directly, and the
/// analytics APIs never redirect.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client honoring the config's per-request timeout.
	pub fn new(config: &Ga4Config) -> Result<Self, ConfigError> {
		let timeout = std::time::Duration::try_from(config.timeout)
			.unwrap_or(std::time::Duration::from_secs(20));
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	async fn execute(request: reqwest::RequestBuilder) -> Result<RawResponse, TransportError> {
		let response = request.send().await?;
		let status = response.status().as_u16();
		let body = response.bytes().await?.to_vec();

		Ok(RawResponse { status, body })
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpClient for ReqwestHttpClient {
	fn get<'a>(&'a self, url: Url, bearer: Option<&'a str>) -> HttpFuture<'a, RawResponse> {
		let mut request = self.0.get(url);

		if let Some(token) = bearer {
			request = request.bearer_auth(token);
		}

		Box::pin(Self::execute(request))
	}

	fn post_form<'a>(
		&'a self,
		url: Url,
		form: &'a [(&'static str, String)],
	) -> HttpFuture<'a, RawResponse> {
		let request = self.0.post(url).form(form);

		Box::pin(Self::execute(request))
	}

	fn post_json<'a>(
		&'a self,
		url: Url,
		bearer: &'a str,
		body: &'a serde_json::Value,
	) -> HttpFuture<'a, RawResponse> {
		let request = self
			.0
			.post(url)
			.bearer_auth(bearer)
			.header("content-type", "application/json; charset=utf-8")
			.body(serde_json::to_vec(body).unwrap_or_default());

		Box::pin(Self::execute(request))
	}
}
