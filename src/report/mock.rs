//! Deterministic sample reports for disconnected or degraded dashboards.
//!
//! Numbers follow a fixed seasonal-ish wave so the dashboard always renders
//! something plausible, and repeated calls on the same day produce identical
//! output (no RNG involved).

// self
use crate::{
	_prelude::*,
	report::{
		DeviceBreakdown, PageEntry, RangeKey, Report, ReportRange, ReportSource, TimePoint,
		Totals, TrafficSources,
	},
};

const MIN_DAILY_SESSIONS: i64 = 40;
const USERS_RATIO: f64 = 0.72;
const PAGEVIEWS_RATIO: f64 = 2.4;
const PAGE_VIEWS_PER_SESSION: f64 = 1.3;

// (title, path, baseline sessions at the 30-day scale)
const PAGE_CATALOG: &[(&str, &str, f64)] = &[
	("Home", "/", 8_200.),
	("Services", "/services/", 5_300.),
	("About", "/about/", 4_100.),
	("Contact", "/contact/", 2_800.),
	("Blog", "/blog/", 2_600.),
	("Pricing", "/pricing/", 2_100.),
	("Case Study: Alpha", "/case-studies/alpha/", 1_700.),
	("Case Study: Beta", "/case-studies/beta/", 1_400.),
	("FAQ", "/faq/", 1_200.),
	("Privacy Policy", "/privacy-policy/", 900.),
];

/// Generates deterministic sample reports.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockReportGenerator;
impl MockReportGenerator {
	/// Builds a sample report for the range, ending today (UTC).
	///
	/// `message` is surfaced as the report's `error_message` so callers can explain
	/// why live data is unavailable.
	pub fn report(&self, range: RangeKey, message: Option<String>) -> Report {
		Self::build(range, OffsetDateTime::now_utc(), message)
	}

	fn build(range: RangeKey, now: OffsetDateTime, message: Option<String>) -> Report {
		let today = now.date();
		let days = range.days() as i64;
		let start = today - Duration::days(days - 1);
		let base = if range == RangeKey::Last30Days { 320 } else { 380 };
		let mut timeseries = Vec::with_capacity(days as usize);
		let mut total_sessions = 0;

		for i in 0..days {
			let date = start + Duration::days(i);
			let wave = (70. * (i as f64 / 3.).sin()) as i64;
			let sessions = (base + wave + i * 3).max(MIN_DAILY_SESSIONS);

			total_sessions += sessions;

			timeseries.push(TimePoint {
				date: format_date(date),
				sessions,
				users: (sessions as f64 * USERS_RATIO).round() as i64,
			});
		}

		let totals = Totals {
			sessions: total_sessions,
			users: (total_sessions as f64 * USERS_RATIO).round() as i64,
			pageviews: (total_sessions as f64 * PAGEVIEWS_RATIO).round() as i64,
			avg_engagement_seconds: if range == RangeKey::Last30Days { 102 } else { 95 },
		};

		Report {
			source: ReportSource::Mock,
			range: ReportRange {
				key: range.as_str().into(),
				start_date: format_date(start),
				end_date: format_date(today),
			},
			totals,
			timeseries,
			top_pages: Self::top_pages(range),
			devices: Self::devices(total_sessions),
			traffic_sources: Self::traffic_sources(total_sessions),
			generated_at: now.unix_timestamp(),
			error_message: message,
		}
	}

	fn top_pages(range: RangeKey) -> Vec<PageEntry> {
		let mult = if range == RangeKey::Last30Days { 1. } else { 0.35 };
		let base_engagement = if range == RangeKey::Last30Days { 102 } else { 95 };

		// The catalog is already ordered by baseline sessions.
		PAGE_CATALOG
			.iter()
			.enumerate()
			.map(|(i, (title, url, baseline))| {
				let sessions = (baseline * mult).round() as i64;

				PageEntry {
					url: (*url).into(),
					title: (*title).into(),
					sessions,
					views: (sessions as f64 * PAGE_VIEWS_PER_SESSION).round() as i64,
					avg_engagement_seconds: (base_engagement - 4 * i as i64).max(30),
				}
			})
			.collect()
	}

	fn devices(total_sessions: i64) -> DeviceBreakdown {
		let desktop = (total_sessions as f64 * 0.52).round() as i64;
		let mobile = (total_sessions as f64 * 0.43).round() as i64;

		DeviceBreakdown {
			desktop,
			mobile,
			tablet: (total_sessions - desktop - mobile).max(0),
		}
	}

	fn traffic_sources(total_sessions: i64) -> TrafficSources {
		let share = |ratio: f64| (total_sessions as f64 * ratio).round() as i64;
		let organic_search = share(0.44);
		let direct = share(0.28);
		let referral = share(0.12);
		let social = share(0.09);

		TrafficSources {
			organic_search,
			direct,
			referral,
			social,
			other: (total_sessions - organic_search - direct - referral - social).max(0),
		}
	}
}

pub(crate) fn format_date(date: Date) -> String {
	format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}
