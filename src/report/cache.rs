//! TTL cache for assembled reports with an explicit key index.
//!
//! Reports are cached as JSON under a key derived from `(tenant, property, range)`.
//! Every written key is also recorded in a settings-backed index so "clear cache"
//! can enumerate and delete exactly what was written, even on transient backends
//! that offer no key listing.

// self
use crate::{
	_prelude::*,
	config::CacheConfig,
	report::{RangeKey, Report, ReportSource},
	store::{SettingsStore, StoreError, TransientStore},
};

const KEY_PREFIX: &str = "ga4_report";

/// Cache reads/writes for assembled reports.
#[derive(Clone)]
pub struct CacheLayer {
	transients: Arc<dyn TransientStore>,
	settings: Arc<dyn SettingsStore>,
	config: CacheConfig,
}
impl CacheLayer {
	/// Creates a layer over the given stores.
	pub fn new(
		transients: Arc<dyn TransientStore>,
		settings: Arc<dyn SettingsStore>,
		config: CacheConfig,
	) -> Self {
		Self { transients, settings, config }
	}

	/// Builds the cache key for a `(property, range)` pair.
	///
	/// The property id is lowercased with `/` mapped to `_` and any other
	/// non-`[a-z0-9_]` characters dropped, so `properties/123` and `PROPERTIES/123`
	/// share an entry.
	pub fn key(&self, property_id: &str, range: RangeKey) -> String {
		let property: String = property_id
			.trim()
			.to_lowercase()
			.chars()
			.map(|c| if c == '/' { '_' } else { c })
			.filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
			.collect();

		format!("{KEY_PREFIX}_{}_{property}_{range}", self.config.tenant)
	}

	/// Returns a cached report, retagged as [`ReportSource::Ga4Cache`].
	///
	/// Disabled caching, a missing entry, and an undecodable entry all read as a
	/// miss. A live entry whose key is absent from the index backfills it, so
	/// entries written before the index existed remain clearable.
	pub async fn read(&self, property_id: &str, range: RangeKey) -> Result<Option<Report>> {
		if !self.config.enabled {
			return Ok(None);
		}

		let key = self.key(property_id, range);
		let Some(raw) = self.transients.get(&key).await? else {
			return Ok(None);
		};
		let Ok(mut report) = serde_json::from_str::<Report>(&raw) else {
			// Stale schema; drop it rather than serving garbage.
			self.transients.delete(&key).await?;

			return Ok(None);
		};

		self.index_key(&key).await?;

		report.source = ReportSource::Ga4Cache;

		Ok(Some(report))
	}

	/// Caches a report for the configured TTL and records its key in the index.
	pub async fn write(&self, property_id: &str, range: RangeKey, report: &Report) -> Result<()> {
		if !self.config.enabled {
			return Ok(());
		}

		let key = self.key(property_id, range);
		let raw = serde_json::to_string(report).map_err(|e| StoreError::Serialization {
			message: e.to_string(),
		})?;

		self.transients.set(&key, raw, self.config.effective_ttl()).await?;
		self.index_key(&key).await?;

		Ok(())
	}

	/// Deletes every indexed entry plus the index itself; returns how many entries
	/// were indexed.
	pub async fn clear_all(&self) -> Result<usize> {
		let keys = self.settings.cache_index().await?;

		for key in &keys {
			self.transients.delete(key).await?;
		}

		self.settings.delete_cache_index().await?;

		Ok(keys.len())
	}

	async fn index_key(&self, key: &str) -> Result<()> {
		let mut index = self.settings.cache_index().await?;

		if index.iter().any(|indexed| indexed == key) {
			return Ok(());
		}

		index.push(key.to_owned());

		self.settings.save_cache_index(index).await?;

		Ok(())
	}
}
impl Debug for CacheLayer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CacheLayer").field("config", &self.config).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		report::MockReportGenerator,
		store::{MemorySettings, MemoryTransients},
	};

	fn layer() -> CacheLayer {
		CacheLayer::new(
			Arc::new(MemoryTransients::default()),
			Arc::new(MemorySettings::default()),
			CacheConfig::default(),
		)
	}

	#[test]
	fn keys_are_sanitized_and_tenant_scoped() {
		let layer = layer();

		assert_eq!(
			layer.key("properties/123", RangeKey::Last7Days),
			"ga4_report_1_properties_123_last_7_days",
		);
		assert_eq!(
			layer.key(" Properties/99! ", RangeKey::Last30Days),
			"ga4_report_1_properties_99_last_30_days",
		);
	}

	#[tokio::test]
	async fn round_trip_retags_the_source() {
		let layer = layer();
		let report = MockReportGenerator.report(RangeKey::Last7Days, None);

		layer
			.write("properties/123", RangeKey::Last7Days, &report)
			.await
			.expect("Writing the report should succeed.");

		let cached = layer
			.read("properties/123", RangeKey::Last7Days)
			.await
			.expect("Reading the cache should succeed.")
			.expect("The cached entry should be present.");

		assert_eq!(cached.source, ReportSource::Ga4Cache);
		assert_eq!(cached.totals, report.totals);
	}

	#[tokio::test]
	async fn disabled_cache_never_hits() {
		let transients = Arc::new(MemoryTransients::default());
		let settings = Arc::new(MemorySettings::default());
		let config = CacheConfig { enabled: false, ..CacheConfig::default() };
		let layer = CacheLayer::new(transients.clone(), settings, config);
		let report = MockReportGenerator.report(RangeKey::Last7Days, None);

		layer
			.write("properties/123", RangeKey::Last7Days, &report)
			.await
			.expect("Writing with caching disabled should be a no-op.");

		assert!(transients.is_empty());
		assert!(
			layer
				.read("properties/123", RangeKey::Last7Days)
				.await
				.expect("Reading the cache should succeed.")
				.is_none()
		);
	}

	#[tokio::test]
	async fn expired_entries_read_as_miss() {
		let transients = Arc::new(MemoryTransients::default());
		let settings = Arc::new(MemorySettings::default());
		let layer =
			CacheLayer::new(transients.clone(), settings, CacheConfig::default());
		let key = layer.key("properties/123", RangeKey::Last7Days);
		let report = MockReportGenerator.report(RangeKey::Last7Days, None);
		let raw = serde_json::to_string(&report).expect("The report fixture should serialize.");

		transients
			.set(&key, raw, Duration::ZERO)
			.await
			.expect("Seeding the instantly-expired entry should succeed.");

		assert!(
			layer
				.read("properties/123", RangeKey::Last7Days)
				.await
				.expect("Reading the cache should succeed.")
				.is_none()
		);
	}

	#[tokio::test]
	async fn undecodable_entries_read_as_miss_and_are_dropped() {
		let transients = Arc::new(MemoryTransients::default());
		let settings = Arc::new(MemorySettings::default());
		let layer =
			CacheLayer::new(transients.clone(), settings, CacheConfig::default());
		let key = layer.key("properties/123", RangeKey::Last7Days);

		transients
			.set(&key, "{not json".into(), Duration::minutes(10))
			.await
			.expect("Seeding the broken entry should succeed.");

		assert!(
			layer
				.read("properties/123", RangeKey::Last7Days)
				.await
				.expect("Reading the cache should succeed.")
				.is_none()
		);
		assert!(transients.is_empty());
	}

	#[tokio::test]
	async fn clear_all_deletes_indexed_entries_and_reports_count() {
		let transients = Arc::new(MemoryTransients::default());
		let settings = Arc::new(MemorySettings::default());
		let layer =
			CacheLayer::new(transients.clone(), settings.clone(), CacheConfig::default());
		let report = MockReportGenerator.report(RangeKey::Last7Days, None);

		layer
			.write("properties/123", RangeKey::Last7Days, &report)
			.await
			.expect("Writing the report should succeed.");
		layer
			.write("properties/123", RangeKey::Last30Days, &report)
			.await
			.expect("Writing the report should succeed.");

		let cleared = layer.clear_all().await.expect("Clearing the cache should succeed.");

		assert_eq!(cleared, 2);
		assert!(transients.is_empty());
		assert!(
			settings.cache_index().await.expect("Index read should succeed.").is_empty(),
		);
		assert!(
			layer
				.read("properties/123", RangeKey::Last7Days)
				.await
				.expect("Reading the cache should succeed.")
				.is_none()
		);
	}

	#[tokio::test]
	async fn pre_index_entries_are_backfilled_on_read() {
		let transients = Arc::new(MemoryTransients::default());
		let settings = Arc::new(MemorySettings::default());
		let layer =
			CacheLayer::new(transients.clone(), settings.clone(), CacheConfig::default());
		let key = layer.key("properties/123", RangeKey::Last7Days);
		let report = MockReportGenerator.report(RangeKey::Last7Days, None);
		let raw = serde_json::to_string(&report).expect("The report fixture should serialize.");

		transients
			.set(&key, raw, Duration::minutes(10))
			.await
			.expect("Seeding the pre-index entry should succeed.");

		layer
			.read("properties/123", RangeKey::Last7Days)
			.await
			.expect("Reading the cache should succeed.")
			.expect("The cached entry should be present.");

		let index = settings.cache_index().await.expect("Index read should succeed.");

		assert_eq!(index, vec![key]);
	}
}
