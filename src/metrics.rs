//! Registry of the exported series.
//!
//! Each [`Metrics`] owns its own Prometheus recorder instead of installing a
//! process-wide one, so the collector and the HTTP handler share exactly the
//! registry they are handed. Gauges are atomics inside the recorder; setting
//! one while a scrape renders the registry needs no further locking.
use std::fmt;

use ::metrics::{counter, describe_counter, describe_gauge, gauge, with_local_recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

/// Whether the last collection reached the directory server.
pub const UP: &str = "openldap_up";
/// `contextCSN` timestamp per replica, labelled with [`REPLICA_LABEL`].
pub const SYNC_COOKIE: &str = "openldap_contextCSN";
/// Number of entries below the base DN.
pub const ENTRIES: &str = "openldap_entries_num";
/// `contextCSN` values that could not be decoded.
pub const COOKIE_DECODE_ERRORS: &str = "openldap_contextCSN_decode_errors_total";
/// Label carrying the replica (server ID) of a sync cookie.
pub const REPLICA_LABEL: &str = "index";

/// The exporter's metrics.
pub struct Metrics {
	/// Stores the series.
	recorder: PrometheusRecorder,
	/// Renders the series in the text exposition format.
	handle: PrometheusHandle,
}

impl Metrics {
	/// Create a registry with every scalar series registered at zero.
	#[must_use]
	pub fn new() -> Self {
		let recorder = PrometheusBuilder::new().build_recorder();
		let handle = recorder.handle();
		with_local_recorder(&recorder, || {
			describe_gauge!(UP, "Value whether a connection to OpenLDAP has been successful");
			describe_gauge!(SYNC_COOKIE, "The first contextCSN sync cookie");
			describe_gauge!(ENTRIES, "Number of entries in directory");
			describe_counter!(
				COOKIE_DECODE_ERRORS,
				"Number of contextCSN values that could not be decoded"
			);
			gauge!(UP).set(0.0);
			gauge!(ENTRIES).set(0.0);
			counter!(COOKIE_DECODE_ERRORS).absolute(0);
		});
		Self { recorder, handle }
	}

	/// Set the health gauge.
	pub fn set_up(&self, up: bool) {
		with_local_recorder(&self.recorder, || gauge!(UP).set(if up { 1.0 } else { 0.0 }));
	}

	/// Record the last change time of a replica. Other replicas keep their
	/// values.
	pub fn set_sync_cookie(&self, replica: &str, epoch_seconds: i64) {
		with_local_recorder(&self.recorder, || {
			gauge!(SYNC_COOKIE, REPLICA_LABEL => replica.to_owned()).set(epoch_seconds as f64);
		});
	}

	/// Record the number of entries below the base DN.
	pub fn set_entries_count(&self, count: usize) {
		with_local_recorder(&self.recorder, || gauge!(ENTRIES).set(count as f64));
	}

	/// Count a `contextCSN` value that failed to decode.
	pub fn record_cookie_decode_error(&self) {
		with_local_recorder(&self.recorder, || counter!(COOKIE_DECODE_ERRORS).increment(1));
	}

	/// Render all series in the Prometheus text exposition format.
	#[must_use]
	pub fn render(&self) -> String {
		self.handle.render()
	}

	/// Look up the current value of a series in the rendered output, e.g.
	/// `openldap_contextCSN{index="001"}`.
	#[cfg(test)]
	pub(crate) fn value(&self, series: &str) -> Option<f64> {
		self.render()
			.lines()
			.filter(|line| !line.starts_with('#'))
			.filter_map(|line| line.rsplit_once(' '))
			.find(|(name, _)| *name == series)
			.and_then(|(_, value)| value.parse().ok())
	}
}

impl Default for Metrics {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Metrics {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Metrics").finish_non_exhaustive()
	}
}
