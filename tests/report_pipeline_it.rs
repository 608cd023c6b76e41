#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use httpmock::Mock;
// self
use ga4_report_core::{
	_preludet::*,
	dashboard::Dashboard,
	report::{ReportSource, TimePoint},
	store::{MemorySettings, MemoryTransients},
};

const RUN_REPORT_PATH: &str = "/data/properties/123:runReport";

fn build_dashboard(
	server: &MockServer,
) -> (Dashboard, Arc<MemorySettings>, Arc<MemoryTransients>) {
	build_test_dashboard(test_config(&server.base_url()), connected_credentials())
}

fn yyyymmdd(date: Date) -> String {
	format!("{:04}{:02}{:02}", date.year(), u8::from(date.month()), date.day())
}

fn iso(date: Date) -> String {
	format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
}

async fn mock_totals(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(RUN_REPORT_PATH)
				.json_body_includes("{\"metricAggregations\":[\"TOTAL\"]}");
			then.status(200).header("content-type", "application/json").body(
				"{\"totals\":[{\"metricValues\":[{\"value\":\"120\"},{\"value\":\"86\"},{\"value\":\"1200\"},{\"value\":\"300\"}]}]}",
			);
		})
		.await
}

async fn mock_timeseries(server: &MockServer, today: Date) -> Mock<'_> {
	let body = format!(
		"{{\"rows\":[{{\"dimensionValues\":[{{\"value\":\"{}\"}}],\"metricValues\":[{{\"value\":\"30\"}},{{\"value\":\"21\"}}]}},{{\"dimensionValues\":[{{\"value\":\"{}\"}}],\"metricValues\":[{{\"value\":\"90\"}},{{\"value\":\"65\"}}]}}]}}",
		yyyymmdd(today - Duration::days(3)),
		yyyymmdd(today),
	);

	server
		.mock_async(move |when, then| {
			when.method(POST)
				.path(RUN_REPORT_PATH)
				.json_body_includes("{\"dimensions\":[{\"name\":\"date\"}]}");
			then.status(200).header("content-type", "application/json").body(body);
		})
		.await
}

async fn mock_top_pages(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(RUN_REPORT_PATH)
				.json_body_includes("{\"dimensions\":[{\"name\":\"pageTitle\"}]}");
			then.status(200).header("content-type", "application/json").body(
				"{\"rows\":[\
					{\"dimensionValues\":[{\"value\":\"(not set)\"},{\"value\":\"/pricing/\"}],\"metricValues\":[{\"value\":\"30\"},{\"value\":\"40\"},{\"value\":\"2000\"}]},\
					{\"dimensionValues\":[{\"value\":\"Pricing\"},{\"value\":\"/pricing\"}],\"metricValues\":[{\"value\":\"45\"},{\"value\":\"60\"},{\"value\":\"1000\"}]},\
					{\"dimensionValues\":[{\"value\":\"Home\"},{\"value\":\"/\"}],\"metricValues\":[{\"value\":\"70\"},{\"value\":\"80\"},{\"value\":\"960\"}]}\
				]}",
			);
		})
		.await
}

async fn mock_devices(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(RUN_REPORT_PATH)
				.json_body_includes("{\"dimensions\":[{\"name\":\"deviceCategory\"}]}");
			then.status(200).header("content-type", "application/json").body(
				"{\"rows\":[\
					{\"dimensionValues\":[{\"value\":\"desktop\"}],\"metricValues\":[{\"value\":\"52\"}]},\
					{\"dimensionValues\":[{\"value\":\"Mobile\"}],\"metricValues\":[{\"value\":\"40\"}]},\
					{\"dimensionValues\":[{\"value\":\"tablet\"}],\"metricValues\":[{\"value\":\"8\"}]},\
					{\"dimensionValues\":[{\"value\":\"smart tv\"}],\"metricValues\":[{\"value\":\"5\"}]}\
				]}",
			);
		})
		.await
}

async fn mock_traffic(server: &MockServer) -> Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(POST)
				.path(RUN_REPORT_PATH)
				.json_body_includes(
					"{\"dimensions\":[{\"name\":\"sessionDefaultChannelGroup\"}]}",
				);
			then.status(200).header("content-type", "application/json").body(
				"{\"rows\":[\
					{\"dimensionValues\":[{\"value\":\"Organic Search\"}],\"metricValues\":[{\"value\":\"30\"}]},\
					{\"dimensionValues\":[{\"value\":\"Direct\"}],\"metricValues\":[{\"value\":\"20\"}]},\
					{\"dimensionValues\":[{\"value\":\"Paid Social\"}],\"metricValues\":[{\"value\":\"5\"}]},\
					{\"dimensionValues\":[{\"value\":\"Email\"}],\"metricValues\":[{\"value\":\"3\"}]},\
					{\"dimensionValues\":[{\"value\":\"Display\"}],\"metricValues\":[{\"value\":\"0\"}]}\
				]}",
			);
		})
		.await
}

#[tokio::test]
async fn full_report_normalizes_all_five_queries() {
	let server = MockServer::start_async().await;
	let (dashboard, _, _) = build_dashboard(&server);
	let today = OffsetDateTime::now_utc().date();
	let totals = mock_totals(&server).await;
	let timeseries = mock_timeseries(&server, today).await;
	let top_pages = mock_top_pages(&server).await;
	let devices = mock_devices(&server).await;
	let traffic = mock_traffic(&server).await;
	let report = dashboard.report("last_7_days").await;

	totals.assert_async().await;
	timeseries.assert_async().await;
	top_pages.assert_async().await;
	devices.assert_async().await;
	traffic.assert_async().await;

	assert_eq!(report.source, ReportSource::Ga4);
	assert!(report.error_message.is_none());
	assert_eq!(report.range.key, "last_7_days");
	assert_eq!(report.range.start_date, iso(today - Duration::days(6)));
	assert_eq!(report.range.end_date, iso(today));

	// Totals: average engagement is per session (1200 / 120).
	assert_eq!(report.totals.sessions, 120);
	assert_eq!(report.totals.users, 86);
	assert_eq!(report.totals.pageviews, 300);
	assert_eq!(report.totals.avg_engagement_seconds, 10);

	// The series covers every day of the window; missing days read as zero.
	assert_eq!(report.timeseries.len(), 7);
	assert_eq!(
		report.timeseries[3],
		TimePoint { date: iso(today - Duration::days(3)), sessions: 30, users: 21 },
	);
	assert_eq!(
		report.timeseries[6],
		TimePoint { date: iso(today), sessions: 90, users: 65 },
	);
	assert_eq!(report.timeseries[0].sessions, 0);

	// `/pricing` and `/pricing/` merge; the placeholder title is upgraded; the root
	// path is relabeled.
	assert_eq!(report.top_pages.len(), 2);
	assert_eq!(report.top_pages[0].url, "/pricing");
	assert_eq!(report.top_pages[0].title, "Pricing");
	assert_eq!(report.top_pages[0].sessions, 75);
	assert_eq!(report.top_pages[0].views, 100);
	// (2000 + 1000) / 100 views.
	assert_eq!(report.top_pages[0].avg_engagement_seconds, 30);
	assert_eq!(report.top_pages[1].url, "/");
	assert_eq!(report.top_pages[1].title, "Landing Page");
	assert!(report.generated_at > 0);

	// Device categories outside the canonical three are dropped.
	assert_eq!(report.devices.desktop, 52);
	assert_eq!(report.devices.mobile, 40);
	assert_eq!(report.devices.tablet, 8);

	// Channel buckets: email lands in other, zero-session rows are skipped.
	assert_eq!(report.traffic_sources.organic_search, 30);
	assert_eq!(report.traffic_sources.direct, 20);
	assert_eq!(report.traffic_sources.social, 5);
	assert_eq!(report.traffic_sources.referral, 0);
	assert_eq!(report.traffic_sources.other, 3);
}

#[tokio::test]
async fn timeseries_window_follows_the_returned_dates() {
	let server = MockServer::start_async().await;
	let (dashboard, _, _) = build_dashboard(&server);
	// A property whose timezone runs ahead of UTC reports rows through "tomorrow".
	let tomorrow = OffsetDateTime::now_utc().date() + Duration::days(1);
	let _totals = mock_totals(&server).await;
	let _timeseries = mock_timeseries(&server, tomorrow).await;
	let _top_pages = mock_top_pages(&server).await;
	let _devices = mock_devices(&server).await;
	let _traffic = mock_traffic(&server).await;
	let report = dashboard.report("last_7_days").await;

	// The latest row anchors the window, so no edge day is zero-dropped.
	assert_eq!(report.timeseries.len(), 7);
	assert_eq!(
		report.timeseries[6],
		TimePoint { date: iso(tomorrow), sessions: 90, users: 65 },
	);
	assert_eq!(report.timeseries[3].sessions, 30);
	assert_eq!(report.range.start_date, iso(tomorrow - Duration::days(6)));
	assert_eq!(report.range.end_date, iso(tomorrow));
}

#[tokio::test]
async fn second_request_serves_the_cache_and_refresh_bypasses_it() {
	let server = MockServer::start_async().await;
	let (dashboard, _, _) = build_dashboard(&server);
	let today = OffsetDateTime::now_utc().date();
	let totals = mock_totals(&server).await;
	let _timeseries = mock_timeseries(&server, today).await;
	let _top_pages = mock_top_pages(&server).await;
	let _devices = mock_devices(&server).await;
	let _traffic = mock_traffic(&server).await;
	let first = dashboard.report("last_7_days").await;
	let second = dashboard.report("last_7_days").await;

	assert_eq!(first.source, ReportSource::Ga4);
	assert_eq!(second.source, ReportSource::Ga4Cache);
	assert_eq!(second.totals, first.totals);
	assert_eq!(totals.hits_async().await, 1);

	let refreshed = dashboard.report_refreshed("last_7_days").await;

	assert_eq!(refreshed.source, ReportSource::Ga4);
	assert_eq!(totals.hits_async().await, 2);
}

#[tokio::test]
async fn clearing_the_cache_forces_the_next_fetch() {
	let server = MockServer::start_async().await;
	let (dashboard, _, transients) = build_dashboard(&server);
	let today = OffsetDateTime::now_utc().date();
	let totals = mock_totals(&server).await;
	let _timeseries = mock_timeseries(&server, today).await;
	let _top_pages = mock_top_pages(&server).await;
	let _devices = mock_devices(&server).await;
	let _traffic = mock_traffic(&server).await;

	dashboard.report("last_7_days").await;

	assert_eq!(transients.len(), 1);

	let cleared = dashboard
		.clear_all_cache()
		.await
		.expect("Clearing the cache should succeed.");

	assert_eq!(cleared, 1);
	assert!(transients.is_empty());

	let report = dashboard.report("last_7_days").await;

	assert_eq!(report.source, ReportSource::Ga4);
	assert_eq!(totals.hits_async().await, 2);
}

#[tokio::test]
async fn traffic_failure_degrades_without_sinking_the_report() {
	let server = MockServer::start_async().await;
	let (dashboard, _, _) = build_dashboard(&server);
	let today = OffsetDateTime::now_utc().date();
	let _totals = mock_totals(&server).await;
	let _timeseries = mock_timeseries(&server, today).await;
	let _top_pages = mock_top_pages(&server).await;
	let _devices = mock_devices(&server).await;
	let _traffic = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(RUN_REPORT_PATH)
				.json_body_includes(
					"{\"dimensions\":[{\"name\":\"sessionDefaultChannelGroup\"}]}",
				);
			then.status(500)
				.header("content-type", "application/json")
				.body("{\"error\":{\"message\":\"Backend blew up\"}}");
		})
		.await;
	let report = dashboard.report("last_7_days").await;

	assert_eq!(report.source, ReportSource::Ga4);
	assert_eq!(report.totals.sessions, 120);
	assert_eq!(report.traffic_sources.total(), 0);

	let message =
		report.error_message.expect("A degraded report should carry an explanation.");

	assert!(message.starts_with("Traffic sources unavailable."));
	assert!(message.contains("Backend blew up"));
}

#[tokio::test]
async fn quota_exhaustion_falls_back_to_sample_data() {
	let server = MockServer::start_async().await;
	let (dashboard, _, transients) = build_dashboard(&server);
	let _totals = server
		.mock_async(|when, then| {
			when.method(POST).path(RUN_REPORT_PATH);
			then.status(429).header("content-type", "application/json").body(
				"{\"error\":{\"status\":\"RESOURCE_EXHAUSTED\",\"message\":\"Quota blown\"}}",
			);
		})
		.await;
	let report = dashboard.report("last_7_days").await;

	assert_eq!(report.source, ReportSource::Mock);
	assert_eq!(report.timeseries.len(), 7);

	let message = report.error_message.expect("The fallback should explain itself.");

	assert!(message.to_lowercase().contains("quota"));
	assert!(message.contains("Quota blown"));
	// A failed fetch is never cached.
	assert!(transients.is_empty());
}
