//! Authenticated client for the Analytics Admin and Data APIs.
//!
//! Every call attaches a Bearer token from the token manager; a 401 triggers exactly
//! one forced refresh + retry, and a second 401 falls through to the normal error
//! mapping. Non-200 payloads are translated into the stable [`ApiError`] taxonomy so
//! callers never branch on raw HTTP codes.

// std
use std::cmp::Ordering;
// self
use crate::{
	_prelude::*,
	auth::TokenManager,
	config::Ga4Config,
	error::{ApiError, ConfigError},
	http::{HttpClient, RawResponse},
	obs::{self, StageKind, StageOutcome, StageSpan},
};

const PAGE_SIZE: u32 = 200;
// Bounds worst-case latency and quota cost on pathological accounts.
const MAX_PAGES: usize = 20;
const DETAIL_MAX_CHARS: usize = 300;

/// One GA4 property flattened out of the account summaries listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySummary {
	/// Property resource name (e.g. `properties/123`).
	pub id: String,
	/// Human-readable label shown in the property picker.
	pub display_name: String,
}

/// Bearer-authenticated client for the two analytics REST APIs.
#[derive(Clone)]
pub struct Ga4Client {
	http: Arc<dyn HttpClient>,
	tokens: Arc<TokenManager>,
	config: Arc<Ga4Config>,
}
impl Ga4Client {
	/// Creates a client sharing the provided transport, token manager, and config.
	pub fn new(
		http: Arc<dyn HttpClient>,
		tokens: Arc<TokenManager>,
		config: Arc<Ga4Config>,
	) -> Self {
		Self { http, tokens, config }
	}

	/// Lists accessible GA4 properties via the paginated account summaries endpoint,
	/// flattened to `(id, display_name)` and sorted case-insensitively in natural order.
	pub async fn list_properties(&self) -> Result<Vec<PropertySummary>> {
		const KIND: StageKind = StageKind::PropertyList;

		let span = StageSpan::new(KIND, "list_properties");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		let result = span.instrument(self.list_properties_inner()).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(KIND, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(KIND, StageOutcome::Failure),
		}

		result
	}

	async fn list_properties_inner(&self) -> Result<Vec<PropertySummary>> {
		let mut properties: HashMap<String, String> = HashMap::new();
		let mut page_token = String::new();
		let mut seen_tokens: Vec<String> = Vec::new();

		for _ in 0..MAX_PAGES {
			let mut url = self.config.admin_api_base.clone();

			url.path_segments_mut()
				.map_err(|_| ConfigError::from(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
				.push("accountSummaries");
			url.query_pairs_mut().append_pair("pageSize", &PAGE_SIZE.to_string());

			if !page_token.is_empty() {
				// Defensive loop guard; a provider echoing the same token forever would
				// otherwise burn all twenty pages.
				if seen_tokens.iter().any(|seen| seen == &page_token) {
					break;
				}

				seen_tokens.push(page_token.clone());
				url.query_pairs_mut().append_pair("pageToken", &page_token);
			}

			let data = self.authorized_get(url).await?;

			for summary in data
				.get("accountSummaries")
				.and_then(serde_json::Value::as_array)
				.into_iter()
				.flatten()
			{
				for property in summary
					.get("propertySummaries")
					.and_then(serde_json::Value::as_array)
					.into_iter()
					.flatten()
				{
					let id = property
						.get("property")
						.and_then(serde_json::Value::as_str)
						.map(str::trim)
						.unwrap_or_default();

					if id.is_empty() {
						continue;
					}

					let display_name = property
						.get("displayName")
						.and_then(serde_json::Value::as_str)
						.filter(|name| !name.is_empty())
						.unwrap_or(id);

					properties.insert(id.to_owned(), display_name.to_owned());
				}
			}

			page_token = data
				.get("nextPageToken")
				.and_then(serde_json::Value::as_str)
				.map(str::trim)
				.unwrap_or_default()
				.to_owned();

			if page_token.is_empty() {
				break;
			}
		}

		let mut properties: Vec<PropertySummary> = properties
			.into_iter()
			.map(|(id, display_name)| PropertySummary { id, display_name })
			.collect();

		properties.sort_by(|a, b| {
			natural_cmp(&a.display_name, &b.display_name).then_with(|| a.id.cmp(&b.id))
		});

		Ok(properties)
	}

	/// Runs a Data API report for the property (`POST {property}:runReport`).
	pub async fn run_report(
		&self,
		property_id: &str,
		body: &serde_json::Value,
	) -> Result<serde_json::Value> {
		let property_id = property_id.trim();

		if property_id.is_empty() {
			return Err(ConfigError::MissingPropertyId.into());
		}

		let url = format!(
			"{}/{}:runReport",
			self.config.data_api_base.as_str().trim_end_matches('/'),
			property_id.trim_matches('/'),
		);
		let url = Url::parse(&url).map_err(ConfigError::from)?;

		self.authorized_post_json(url, body).await
	}

	async fn authorized_get(&self, url: Url) -> Result<serde_json::Value> {
		let token = self.tokens.valid_access_token().await?;
		let mut response = self.http.get(url.clone(), Some(&token)).await?;

		if response.status == 401 {
			let token = self.tokens.refresh_access_token(Some(&token)).await?;

			response = self.http.get(url, Some(&token)).await?;
		}

		Self::decode(response)
	}

	async fn authorized_post_json(
		&self,
		url: Url,
		body: &serde_json::Value,
	) -> Result<serde_json::Value> {
		let token = self.tokens.valid_access_token().await?;
		let mut response = self.http.post_json(url.clone(), &token, body).await?;

		if response.status == 401 {
			let token = self.tokens.refresh_access_token(Some(&token)).await?;

			response = self.http.post_json(url, &token, body).await?;
		}

		Self::decode(response)
	}

	fn decode(response: RawResponse) -> Result<serde_json::Value> {
		let Ok(data) = serde_json::from_slice::<serde_json::Value>(&response.body) else {
			return Err(ApiError::InvalidResponse { status: response.status }.into());
		};

		if response.status != 200 {
			return Err(map_api_error(response.status, &data).into());
		}

		Ok(data)
	}
}
impl Debug for Ga4Client {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Ga4Client").field("config", &self.config).finish()
	}
}

/// Converts a Google error payload into the stable [`ApiError`] taxonomy.
pub(crate) fn map_api_error(status: u16, data: &serde_json::Value) -> ApiError {
	let error = data.get("error");
	let status_text = error
		.and_then(|error| error.get("status"))
		.and_then(serde_json::Value::as_str)
		.unwrap_or_default()
		.to_uppercase();
	let message = error
		.and_then(|error| error.get("message"))
		.and_then(serde_json::Value::as_str)
		.map(str::trim)
		.unwrap_or_default();
	let detail = if message.is_empty() {
		String::new()
	} else {
		format!(" (Google: {})", truncate_chars(message, DETAIL_MAX_CHARS))
	};

	if status == 403 || status_text == "PERMISSION_DENIED" {
		ApiError::PermissionDenied { detail }
	} else if status == 404 || status_text == "NOT_FOUND" {
		ApiError::NotFound { detail }
	} else if status == 429 || status_text == "RESOURCE_EXHAUSTED" {
		ApiError::QuotaExceeded { detail }
	} else {
		ApiError::Failed { detail }
	}
}

fn truncate_chars(view: &str, max: usize) -> String {
	view.chars().take(max).collect()
}

/// Case-insensitive natural ordering: digit runs compare numerically, text runs
/// lexicographically.
pub(crate) fn natural_cmp(a: &str, b: &str) -> Ordering {
	let mut a_chars = a.chars().peekable();
	let mut b_chars = b.chars().peekable();

	loop {
		match (a_chars.peek().copied(), b_chars.peek().copied()) {
			(None, None) => return Ordering::Equal,
			(None, Some(_)) => return Ordering::Less,
			(Some(_), None) => return Ordering::Greater,
			(Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
				let a_run = take_digits(&mut a_chars);
				let b_run = take_digits(&mut b_chars);
				let a_trim = a_run.trim_start_matches('0');
				let b_trim = b_run.trim_start_matches('0');
				let ordering = a_trim
					.len()
					.cmp(&b_trim.len())
					.then_with(|| a_trim.cmp(b_trim))
					.then_with(|| a_run.len().cmp(&b_run.len()));

				if ordering != Ordering::Equal {
					return ordering;
				}
			},
			(Some(x), Some(y)) => {
				let x = x.to_lowercase().next().unwrap_or(x);
				let y = y.to_lowercase().next().unwrap_or(y);

				if x != y {
					return x.cmp(&y);
				}

				a_chars.next();
				b_chars.next();
			},
		}
	}
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
	let mut run = String::new();

	while let Some(c) = chars.peek().copied() {
		if !c.is_ascii_digit() {
			break;
		}

		run.push(c);
		chars.next();
	}

	run
}
