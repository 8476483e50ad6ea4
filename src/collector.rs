//! The collection cycle and the loop that repeats it.
use std::{sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

use crate::{
	cookie::SyncCookie,
	directory::{Directory, DirectorySession},
	metrics::Metrics,
};

/// Periodically reads the sync state of a directory server into [`Metrics`].
#[derive(Debug)]
pub struct Collector<D> {
	/// Source of directory sessions.
	directory: D,
	/// Entry holding the sync cookies and root of the counted subtree.
	base_dn: String,
	/// Where results are published.
	metrics: Arc<Metrics>,
}

impl<D: Directory> Collector<D> {
	/// Create a new [`Collector`] publishing into `metrics`.
	#[must_use]
	pub fn new(directory: D, base_dn: impl Into<String>, metrics: Arc<Metrics>) -> Self {
		Self { directory, base_dn: base_dn.into(), metrics }
	}

	/// Collect immediately, then again each time `interval` has passed after
	/// the previous collection finished. Never returns.
	pub async fn run(&self, interval: Duration) {
		info!(interval = ?interval, base_dn = %self.base_dn, "Starting collection loop");
		loop {
			self.collect_once().await;
			tokio::time::sleep(interval).await;
		}
	}

	/// Perform one collection. Failures are logged and reflected in the `up`
	/// gauge; the other series keep their last known values.
	///
	/// `up` ends up as 1 if either query succeeded, and is always set before
	/// the values of the query it reports on.
	pub async fn collect_once(&self) {
		let mut session = match self.directory.connect().await {
			Ok(session) => session,
			Err(err) => {
				self.metrics.set_up(false);
				error!("Connecting to the directory server failed: {err}");
				return;
			}
		};

		let cookies = session.sync_cookies(&self.base_dn).await;
		let cookies_ok = cookies.is_ok();
		self.metrics.set_up(cookies_ok);
		match cookies {
			Ok(cookies) => self.publish_cookies(&cookies),
			Err(err) => warn!("Reading contextCSN of {} failed: {err}", self.base_dn),
		}

		let count = session.count_entries(&self.base_dn).await;
		self.metrics.set_up(cookies_ok || count.is_ok());
		match count {
			Ok(count) => {
				debug!(count, "Counted entries");
				self.metrics.set_entries_count(count);
			}
			Err(err) => warn!("Counting entries below {} failed: {err}", self.base_dn),
		}

		session.close().await;
	}

	/// Decode each `contextCSN` value and set the gauge of its replica.
	/// Values that do not decode are counted and skipped.
	fn publish_cookies(&self, cookies: &[String]) {
		if cookies.is_empty() {
			debug!("{} has no contextCSN", self.base_dn);
		}
		for csn in cookies {
			match csn.parse::<SyncCookie>() {
				Ok(cookie) => {
					debug!(replica = %cookie.replica, csn = %csn, "Decoded sync cookie");
					self.metrics.set_sync_cookie(&cookie.replica, cookie.epoch_seconds());
				}
				Err(err) => {
					warn!("Ignoring undecodable contextCSN {csn:?}: {err}");
					self.metrics.record_cookie_decode_error();
				}
			}
		}
	}
}
