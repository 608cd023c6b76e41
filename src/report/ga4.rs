//! Live report assembly from the Data API.
//!
//! One report is five `runReport` queries (totals, daily series, top pages, devices,
//! traffic channels) normalized into a [`Report`]. The first four are required; a
//! traffic-channel failure degrades to zeroed buckets with a warning instead of
//! sinking the whole report.

// self
use crate::{
	_prelude::*,
	client::Ga4Client,
	obs::{self, StageKind, StageOutcome, StageSpan},
	report::{
		CacheLayer, DeviceBreakdown, PageEntry, RangeKey, Report, ReportRange, ReportSource,
		TimePoint, Totals, TrafficSources, mock::format_date,
	},
};

// Over-fetch so path canonicalization has duplicates to merge before the top ten are
// taken.
const TOP_PAGES_FETCH_LIMIT: u32 = 25;
const TOP_PAGES_SHOWN: usize = 10;
const TRAFFIC_FETCH_LIMIT: u32 = 50;
const LANDING_PAGE_TITLE: &str = "Landing Page";
const NOT_SET: &str = "(not set)";

/// Assembles live reports, consulting the cache first.
#[derive(Clone, Debug)]
pub struct Ga4ReportBuilder {
	client: Ga4Client,
	cache: CacheLayer,
}
impl Ga4ReportBuilder {
	/// Creates a builder over the shared client and cache layer.
	pub fn new(client: Ga4Client, cache: CacheLayer) -> Self {
		Self { client, cache }
	}

	/// Access to the cache layer for bulk invalidation.
	pub fn cache(&self) -> &CacheLayer {
		&self.cache
	}

	/// Produces a report for the property and range.
	///
	/// Unless `force_refresh` is set, a live cache entry short-circuits the network
	/// entirely (returned as [`ReportSource::Ga4Cache`]). Cache read problems count
	/// as a miss; a cache write failure never sinks an already assembled report.
	pub async fn report(
		&self,
		property_id: &str,
		range: RangeKey,
		force_refresh: bool,
	) -> Result<Report> {
		if !force_refresh
			&& let Some(cached) =
				self.cache.read(property_id, range).await.unwrap_or_default()
		{
			return Ok(cached);
		}

		const KIND: StageKind = StageKind::Report;

		let span = StageSpan::new(KIND, "report");

		obs::record_stage_outcome(KIND, StageOutcome::Attempt);

		let result = span.instrument(self.assemble(property_id, range)).await;

		match &result {
			Ok(_) => obs::record_stage_outcome(KIND, StageOutcome::Success),
			Err(_) => obs::record_stage_outcome(KIND, StageOutcome::Failure),
		}

		let report = result?;

		// A failed cache write is not worth failing the report over; the next
		// request simply recomputes.
		let _ = self.cache.write(property_id, range, &report).await;

		Ok(report)
	}

	async fn assemble(&self, property_id: &str, range: RangeKey) -> Result<Report> {
		let now = OffsetDateTime::now_utc();
		let today = now.date();
		let totals = self.fetch_totals(property_id, range).await?;
		let timeseries = self.fetch_timeseries(property_id, range, today).await?;
		let top_pages = self.fetch_top_pages(property_id, range).await?;
		let devices = self.fetch_devices(property_id, range).await?;
		let (traffic_sources, error_message) =
			match self.fetch_traffic_sources(property_id, range).await {
				Ok(traffic) => (traffic, None),
				// Non-fatal: the rest of the report is still worth rendering.
				Err(e) => (
					TrafficSources::default(),
					Some(format!("Traffic sources unavailable. {e}")),
				),
			};
		// The displayed window mirrors the series so the two never disagree.
		let start_date = timeseries.first().map(|point| point.date.clone()).unwrap_or_else(
			|| format_date(today - Duration::days(range.days() as i64 - 1)),
		);
		let end_date = timeseries
			.last()
			.map(|point| point.date.clone())
			.unwrap_or_else(|| format_date(today));

		Ok(Report {
			source: ReportSource::Ga4,
			range: ReportRange { key: range.as_str().into(), start_date, end_date },
			totals,
			timeseries,
			top_pages,
			devices,
			traffic_sources,
			generated_at: now.unix_timestamp(),
			error_message,
		})
	}

	async fn fetch_totals(&self, property_id: &str, range: RangeKey) -> Result<Totals> {
		let body = serde_json::json!({
			"dateRanges": [date_range(range)],
			"metrics": [
				{ "name": "sessions" },
				{ "name": "totalUsers" },
				// The Data API has no average-engagement metric; fetch the total
				// duration and divide by sessions locally.
				{ "name": "userEngagementDuration" },
				{ "name": "screenPageViews" },
			],
			"metricAggregations": ["TOTAL"],
		});
		let data = self.client.run_report(property_id, &body).await?;
		// Some responses omit totals[] and return a single aggregate row instead.
		let values = data
			.pointer("/totals/0/metricValues")
			.or_else(|| data.pointer("/rows/0/metricValues"))
			.and_then(serde_json::Value::as_array);
		let metric = |idx: usize| {
			values
				.and_then(|values| values.get(idx))
				.map(metric_f64)
				.unwrap_or_default()
		};
		let sessions = metric(0).round() as i64;
		let engagement_total = metric(2);

		Ok(Totals {
			sessions,
			users: metric(1).round() as i64,
			pageviews: metric(3).round() as i64,
			avg_engagement_seconds: if sessions > 0 {
				(engagement_total / sessions as f64).round() as i64
			} else {
				0
			},
		})
	}

	/// Fetches the daily series, gap-filled to one point per calendar day.
	///
	/// The window is anchored to the latest returned row date rather than to
	/// `fallback_end`: the Data API resolves `today` in the property's timezone,
	/// which can sit a day off from UTC. `fallback_end` only applies when the
	/// response carries no rows at all.
	async fn fetch_timeseries(
		&self,
		property_id: &str,
		range: RangeKey,
		fallback_end: Date,
	) -> Result<Vec<TimePoint>> {
		let body = serde_json::json!({
			"dateRanges": [date_range(range)],
			"dimensions": [{ "name": "date" }],
			"metrics": [{ "name": "sessions" }, { "name": "totalUsers" }],
			"orderBys": [{ "dimension": { "dimensionName": "date" } }],
		});
		let data = self.client.run_report(property_id, &body).await?;
		let mut by_date: HashMap<Date, (i64, i64)> = HashMap::new();

		for row in rows(&data) {
			let Some(date) = parse_yyyymmdd(dimension_value(row, 0)) else {
				continue;
			};
			let sessions = metric_value(row, 0).round() as i64;
			let users = metric_value(row, 1).round() as i64;

			by_date.insert(date, (sessions, users));
		}

		// Emit one point per calendar day so sparse provider rows never produce a
		// jagged series; missing days read as zero.
		let end = by_date.keys().copied().max().unwrap_or(fallback_end);
		let start = end - Duration::days(range.days() as i64 - 1);
		let mut series = Vec::with_capacity(range.days() as usize);

		for i in 0..range.days() as i64 {
			let date = start + Duration::days(i);
			let (sessions, users) = by_date.get(&date).copied().unwrap_or_default();

			series.push(TimePoint { date: format_date(date), sessions, users });
		}

		Ok(series)
	}

	async fn fetch_top_pages(
		&self,
		property_id: &str,
		range: RangeKey,
	) -> Result<Vec<PageEntry>> {
		struct Accumulator {
			title: String,
			sessions: i64,
			views: i64,
			engagement_total: f64,
		}

		let body = serde_json::json!({
			"dateRanges": [date_range(range)],
			"dimensions": [{ "name": "pageTitle" }, { "name": "pagePath" }],
			"metrics": [
				{ "name": "sessions" },
				{ "name": "screenPageViews" },
				{ "name": "userEngagementDuration" },
			],
			"orderBys": [{ "metric": { "metricName": "screenPageViews" }, "desc": true }],
			"limit": TOP_PAGES_FETCH_LIMIT,
		});
		let data = self.client.run_report(property_id, &body).await?;
		let mut by_path: HashMap<String, Accumulator> = HashMap::new();

		for row in rows(&data) {
			let title = dimension_value(row, 0).trim();
			let path = canonicalize_page_path(dimension_value(row, 1));
			let sessions = metric_value(row, 0).round() as i64;
			let views = metric_value(row, 1).round() as i64;
			let engagement = metric_value(row, 2);
			let entry = by_path.entry(path).or_insert_with(|| Accumulator {
				title: title.to_owned(),
				sessions: 0,
				views: 0,
				engagement_total: 0.,
			});

			entry.sessions += sessions;
			entry.views += views;
			entry.engagement_total += engagement;

			// Upgrade placeholder titles when a later row carries a real one.
			if !title.is_empty()
				&& !title.eq_ignore_ascii_case(NOT_SET)
				&& (entry.title.trim().is_empty()
					|| entry.title.trim().eq_ignore_ascii_case(NOT_SET))
			{
				entry.title = title.to_owned();
			}
		}

		let mut pages: Vec<PageEntry> = by_path
			.into_iter()
			.map(|(url, entry)| {
				let title = if url == "/" { LANDING_PAGE_TITLE.into() } else { entry.title };
				let avg_engagement_seconds = if entry.views > 0 {
					(entry.engagement_total / entry.views as f64).round() as i64
				} else {
					0
				};

				PageEntry {
					url,
					title,
					sessions: entry.sessions,
					views: entry.views,
					avg_engagement_seconds,
				}
			})
			.collect();

		pages.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.url.cmp(&b.url)));
		pages.truncate(TOP_PAGES_SHOWN);

		Ok(pages)
	}

	async fn fetch_devices(
		&self,
		property_id: &str,
		range: RangeKey,
	) -> Result<DeviceBreakdown> {
		let body = serde_json::json!({
			"dateRanges": [date_range(range)],
			"dimensions": [{ "name": "deviceCategory" }],
			"metrics": [{ "name": "sessions" }],
			"orderBys": [{ "metric": { "metricName": "sessions" }, "desc": true }],
		});
		let data = self.client.run_report(property_id, &body).await?;
		let mut devices = DeviceBreakdown::default();

		for row in rows(&data) {
			let sessions = metric_value(row, 0).round() as i64;

			// Categories beyond the canonical three (e.g. "smart tv") are dropped.
			match dimension_value(row, 0).trim().to_lowercase().as_str() {
				"desktop" => devices.desktop += sessions,
				"mobile" => devices.mobile += sessions,
				"tablet" => devices.tablet += sessions,
				_ => {},
			}
		}

		Ok(devices)
	}

	async fn fetch_traffic_sources(
		&self,
		property_id: &str,
		range: RangeKey,
	) -> Result<TrafficSources> {
		let body = serde_json::json!({
			"dateRanges": [date_range(range)],
			"dimensions": [{ "name": "sessionDefaultChannelGroup" }],
			"metrics": [{ "name": "sessions" }],
			"orderBys": [{ "metric": { "metricName": "sessions" }, "desc": true }],
			"limit": TRAFFIC_FETCH_LIMIT,
		});
		let data = self.client.run_report(property_id, &body).await?;
		let mut traffic = TrafficSources::default();

		for row in rows(&data) {
			traffic
				.add_channel(dimension_value(row, 0), metric_value(row, 0).round() as i64);
		}

		Ok(traffic)
	}
}

fn date_range(range: RangeKey) -> serde_json::Value {
	serde_json::json!({ "startDate": range.ga4_start(), "endDate": range.ga4_end() })
}

fn rows(data: &serde_json::Value) -> impl Iterator<Item = &serde_json::Value> {
	data.get("rows").and_then(serde_json::Value::as_array).into_iter().flatten()
}

fn dimension_value(row: &serde_json::Value, idx: usize) -> &str {
	row.pointer(&format!("/dimensionValues/{idx}/value"))
		.and_then(serde_json::Value::as_str)
		.unwrap_or_default()
}

fn metric_value(row: &serde_json::Value, idx: usize) -> f64 {
	row.pointer(&format!("/metricValues/{idx}/value")).map(metric_f64).unwrap_or_default()
}

fn metric_f64(value: &serde_json::Value) -> f64 {
	match value {
		serde_json::Value::String(raw) => raw.trim().parse().unwrap_or_default(),
		other => other.as_f64().unwrap_or_default(),
	}
}

/// Normalizes a GA4 `pagePath` so variants like `/page` and `/page/` merge.
pub(crate) fn canonicalize_page_path(path: &str) -> String {
	let path = path.trim();

	if path.is_empty() || path == "/" {
		return "/".into();
	}

	let trimmed = path.trim_start_matches('/').trim_end_matches('/');

	if trimmed.is_empty() {
		"/".into()
	} else {
		format!("/{trimmed}")
	}
}

/// Parses GA4's `YYYYMMDD` date dimension.
pub(crate) fn parse_yyyymmdd(raw: &str) -> Option<Date> {
	let raw = raw.trim();

	if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}

	let year = raw[..4].parse().ok()?;
	let month = time::Month::try_from(raw[4..6].parse::<u8>().ok()?).ok()?;
	let day = raw[6..8].parse().ok()?;

	Date::from_calendar_date(year, month, day).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::date;
	// self
	use super::*;

	#[test]
	fn page_paths_canonicalize() {
		assert_eq!(canonicalize_page_path(""), "/");
		assert_eq!(canonicalize_page_path("  "), "/");
		assert_eq!(canonicalize_page_path("/"), "/");
		assert_eq!(canonicalize_page_path("///"), "/");
		assert_eq!(canonicalize_page_path("about/"), "/about");
		assert_eq!(canonicalize_page_path("/about/"), "/about");
		assert_eq!(canonicalize_page_path("/blog/post-1"), "/blog/post-1");
	}

	#[test]
	fn ga4_dates_parse() {
		assert_eq!(parse_yyyymmdd("20260817"), Some(date!(2026 - 08 - 17)));
		assert_eq!(parse_yyyymmdd(" 20260817 "), Some(date!(2026 - 08 - 17)));
		assert_eq!(parse_yyyymmdd("2026-08-17"), None);
		assert_eq!(parse_yyyymmdd("20261345"), None);
		assert_eq!(parse_yyyymmdd("(other)"), None);
		assert_eq!(parse_yyyymmdd(""), None);
	}

	#[test]
	fn metric_values_parse_from_strings_and_numbers() {
		assert_eq!(metric_f64(&serde_json::json!("12.7")), 12.7);
		assert_eq!(metric_f64(&serde_json::json!(3)), 3.);
		assert_eq!(metric_f64(&serde_json::json!("garbage")), 0.);
		assert_eq!(metric_f64(&serde_json::json!(null)), 0.);
	}
}
