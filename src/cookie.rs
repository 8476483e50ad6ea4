//! Decoding of syncrepl `contextCSN` cookies.
//!
//! A change sequence number as written by OpenLDAP looks like
//! `20240101120000.123456Z#000000#003#000000`: a generalized time with a
//! microsecond fraction, a change count, the server ID of the replica that
//! produced the change, and a modification number.
use std::str::FromStr;

use time::{OffsetDateTime, PrimitiveDateTime};

/// The whole-second part of a CSN timestamp, interpreted as UTC.
pub const CSN_TIME_FORMAT: &[time::format_description::FormatItem] =
	time::macros::format_description!("[year][month][day][hour][minute][second]");

/// A decoded sync cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCookie {
	/// Time of the last change recorded by the replica.
	pub timestamp: OffsetDateTime,
	/// Server ID of the replica the cookie belongs to.
	pub replica: String,
}

impl SyncCookie {
	/// Seconds since the unix epoch of the recorded change.
	#[must_use]
	pub fn epoch_seconds(&self) -> i64 {
		self.timestamp.unix_timestamp()
	}
}

impl FromStr for SyncCookie {
	type Err = CookieError;

	fn from_str(csn: &str) -> Result<Self, Self::Err> {
		let stamp = csn.split('.').next().unwrap_or_default();
		let timestamp = PrimitiveDateTime::parse(stamp, &CSN_TIME_FORMAT)?.assume_utc();
		let replica = csn
			.split('#')
			.nth(2)
			.filter(|replica| !replica.is_empty())
			.ok_or(CookieError::MissingReplica)?;
		Ok(Self { timestamp, replica: replica.to_owned() })
	}
}

/// Errors that can occur when decoding a sync cookie.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
	/// The timestamp in front of the first `.` is not a `YYYYMMDDhhmmss`
	/// date.
	#[error("Malformed CSN timestamp: {0}")]
	Time(#[from] time::error::Parse),
	/// There is no third `#`-separated field to take the replica from, or it
	/// is empty.
	#[error("CSN has no replica field")]
	MissingReplica,
}
