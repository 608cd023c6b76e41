//! Normalized report model shared by the live GA4 pipeline and the mock generator.
//!
//! Consumers render a [`Report`] without caring where it came from; [`ReportSource`]
//! carries the provenance (`ga4`, `ga4_cache`, or `mock`) for display only.

pub mod cache;
pub mod ga4;
pub mod mock;

pub use cache::CacheLayer;
pub use ga4::Ga4ReportBuilder;
pub use mock::MockReportGenerator;

// self
use crate::_prelude::*;

/// Supported date ranges.
///
/// Unknown keys fall back to [`RangeKey::Last7Days`] so a stale or mistyped selection
/// still renders a dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RangeKey {
	/// Trailing seven days including today.
	#[default]
	Last7Days,
	/// Trailing thirty days including today.
	Last30Days,
}
impl RangeKey {
	/// Parses a range key leniently; anything unrecognized maps to seven days.
	pub fn from_key(key: &str) -> Self {
		match key.trim() {
			"last_30_days" => RangeKey::Last30Days,
			_ => RangeKey::Last7Days,
		}
	}

	/// Stable identifier used in cache keys and serialized reports.
	pub const fn as_str(self) -> &'static str {
		match self {
			RangeKey::Last7Days => "last_7_days",
			RangeKey::Last30Days => "last_30_days",
		}
	}

	/// Number of days covered, including today.
	pub const fn days(self) -> u32 {
		match self {
			RangeKey::Last7Days => 7,
			RangeKey::Last30Days => 30,
		}
	}

	/// Relative start-date expression understood by the Data API.
	pub const fn ga4_start(self) -> &'static str {
		match self {
			RangeKey::Last7Days => "6daysAgo",
			RangeKey::Last30Days => "29daysAgo",
		}
	}

	/// Relative end-date expression understood by the Data API.
	pub const fn ga4_end(self) -> &'static str {
		"today"
	}
}
impl Display for RangeKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Where a report's numbers came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSource {
	/// Fresh Data API responses.
	Ga4,
	/// A previously cached GA4 report.
	Ga4Cache,
	/// Deterministic sample data.
	Mock,
}
impl ReportSource {
	/// Stable identifier matching the serialized form.
	pub const fn as_str(self) -> &'static str {
		match self {
			ReportSource::Ga4 => "ga4",
			ReportSource::Ga4Cache => "ga4_cache",
			ReportSource::Mock => "mock",
		}
	}
}
impl Display for ReportSource {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Concrete date window a report covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
	/// Stable range key (`last_7_days` / `last_30_days`).
	pub key: String,
	/// Inclusive start date, `YYYY-MM-DD`.
	pub start_date: String,
	/// Inclusive end date, `YYYY-MM-DD`.
	pub end_date: String,
}

/// Headline totals for the window.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
	/// Total sessions.
	pub sessions: i64,
	/// Total unique users.
	pub users: i64,
	/// Total page views.
	pub pageviews: i64,
	/// Average engagement duration in whole seconds.
	pub avg_engagement_seconds: i64,
}

/// One day of the time series.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePoint {
	/// Calendar date, `YYYY-MM-DD`.
	pub date: String,
	/// Sessions on that date.
	pub sessions: i64,
	/// Users on that date.
	pub users: i64,
}

/// One aggregated page entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
	/// Canonicalized path.
	pub url: String,
	/// Page title, best-effort across merged rows.
	pub title: String,
	/// Aggregated sessions.
	pub sessions: i64,
	/// Aggregated page views.
	pub views: i64,
	/// Average engagement per view, whole seconds.
	pub avg_engagement_seconds: i64,
}

/// Sessions split by device category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceBreakdown {
	/// Desktop sessions.
	pub desktop: i64,
	/// Mobile sessions.
	pub mobile: i64,
	/// Tablet sessions.
	pub tablet: i64,
}

/// Sessions bucketed into coarse acquisition channels.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSources {
	/// Search-driven sessions.
	pub organic_search: i64,
	/// Direct sessions.
	pub direct: i64,
	/// Referral sessions.
	pub referral: i64,
	/// Social sessions (organic and paid).
	pub social: i64,
	/// Everything else.
	pub other: i64,
}
impl TrafficSources {
	/// Adds a GA4 channel-group row into the matching coarse bucket.
	///
	/// Matching is substring-based on the lowercased channel name (so `Paid Social`
	/// and `Organic Social` both land in `social`), except `direct` which must match
	/// exactly. Non-positive session counts are skipped entirely.
	pub fn add_channel(&mut self, channel: &str, sessions: i64) {
		if sessions <= 0 {
			return;
		}

		let channel = channel.trim().to_lowercase();
		let bucket = if channel.contains("organic search") {
			&mut self.organic_search
		} else if channel == "direct" {
			&mut self.direct
		} else if channel.contains("referral") {
			&mut self.referral
		} else if channel.contains("social") {
			&mut self.social
		} else {
			&mut self.other
		};

		*bucket += sessions;
	}

	/// Sum across all buckets.
	pub fn total(&self) -> i64 {
		self.organic_search + self.direct + self.referral + self.social + self.other
	}
}

/// A fully normalized dashboard report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
	/// Provenance of the numbers.
	pub source: ReportSource,
	/// Date window covered.
	pub range: ReportRange,
	/// Headline totals.
	pub totals: Totals,
	/// Per-day series covering every day of the window.
	pub timeseries: Vec<TimePoint>,
	/// Top pages, at most ten, sorted by views descending.
	pub top_pages: Vec<PageEntry>,
	/// Sessions by device category.
	pub devices: DeviceBreakdown,
	/// Sessions by acquisition channel.
	pub traffic_sources: TrafficSources,
	/// Epoch seconds when the report was assembled.
	pub generated_at: i64,
	/// Human-readable note when the report degraded (e.g. mock fallback reason).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn range_key_parsing_is_lenient() {
		assert_eq!(RangeKey::from_key("last_30_days"), RangeKey::Last30Days);
		assert_eq!(RangeKey::from_key("last_7_days"), RangeKey::Last7Days);
		assert_eq!(RangeKey::from_key("bogus"), RangeKey::Last7Days);
		assert_eq!(RangeKey::from_key(""), RangeKey::Last7Days);
	}

	#[test]
	fn channels_bucket_by_substring() {
		let mut traffic = TrafficSources::default();

		traffic.add_channel("Organic Search", 10);
		traffic.add_channel("Direct", 7);
		traffic.add_channel("Referral", 3);
		traffic.add_channel("Organic Social", 2);
		traffic.add_channel("Paid Social", 1);
		traffic.add_channel("Paid Search", 5);
		traffic.add_channel("Email", 4);
		traffic.add_channel("Display", 0);
		traffic.add_channel("Video", -9);

		assert_eq!(traffic.organic_search, 10);
		assert_eq!(traffic.direct, 7);
		assert_eq!(traffic.referral, 3);
		assert_eq!(traffic.social, 3);
		assert_eq!(traffic.other, 9);
		assert_eq!(traffic.total(), 32);
	}

	#[test]
	fn report_round_trips_through_json() {
		let report = Report {
			source: ReportSource::Mock,
			range: ReportRange {
				key: RangeKey::Last7Days.as_str().into(),
				start_date: "2026-08-17".into(),
				end_date: "2026-08-23".into(),
			},
			totals: Totals {
				sessions: 100,
				users: 72,
				pageviews: 240,
				avg_engagement_seconds: 95,
			},
			timeseries: vec![TimePoint { date: "2026-08-17".into(), sessions: 10, users: 7 }],
			top_pages: vec![PageEntry {
				url: "/".into(),
				title: "Landing Page".into(),
				sessions: 32,
				views: 40,
				avg_engagement_seconds: 60,
			}],
			devices: DeviceBreakdown { desktop: 52, mobile: 43, tablet: 5 },
			traffic_sources: TrafficSources::default(),
			generated_at: 1_787_000_000,
			error_message: None,
		};
		let json = serde_json::to_string(&report).expect("The report should serialize.");
		let decoded: Report =
			serde_json::from_str(&json).expect("The report should deserialize.");

		assert_eq!(decoded, report);
		assert!(json.contains("\"source\":\"mock\""));
		assert!(json.contains("\"users\":72"));
		assert!(json.contains("\"avg_engagement_seconds\":95"));
		assert!(json.contains("\"traffic_sources\":"));
		assert!(!json.contains("error_message"));

		let degraded = Report { error_message: Some("sample data".into()), ..report };
		let json =
			serde_json::to_string(&degraded).expect("The degraded report should serialize.");

		assert!(json.contains("\"error_message\":\"sample data\""));
	}
}
