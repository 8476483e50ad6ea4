//! Export the replication state of an OpenLDAP server as Prometheus metrics.
//!
//! The exporter periodically connects to a directory server, reads the
//! `contextCSN` sync cookies of the base entry and counts the entries below
//! it. The results are kept in a [`Metrics`] registry which is rendered in
//! the Prometheus text format on every scrape:
//!
//! * `openldap_up` is 1 if the last collection reached the server,
//! * `openldap_contextCSN{index="<server ID>"}` holds the time of the last
//!   change recorded by each replica, in seconds since the epoch,
//! * `openldap_entries_num` holds the number of entries below the base DN.
//!
//! Values are only ever overwritten by later successful queries. When the
//! server becomes unreachable `openldap_up` drops to 0 while the other series
//! keep their last known values, and a replica that disappears from the
//! `contextCSN` attribute keeps its last gauge value.
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate which
//! is used here for interfacing with LDAP is an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//!
//! use syncrepl_exporter::{server, Collector, Config, LdapDirectory, Metrics};
//!
//! let config = Config::load("config.yaml")?;
//! let metrics = Arc::new(Metrics::new());
//!
//! let collector = Collector::new(
//!     LdapDirectory::new(config.ldap.clone()),
//!     config.ldap.basedn.clone(),
//!     metrics.clone(),
//! );
//! let interval = config.poll_interval();
//! tokio::spawn(async move { collector.run(interval).await });
//!
//! let router = server::router(metrics, "/metrics")?;
//! server::serve(server::parse_listen_address(":9328")?, router).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Only a single directory server is polled per process.
//! * Certificate verification can only be switched off as a whole, there is
//!   no pinning of self-signed certificates.
//! * A query that hangs blocks the collection loop until the transport gives
//!   up; there is no per-operation timeout.

pub mod collector;
pub mod config;
pub mod cookie;
pub mod directory;
pub mod entry;
pub mod error;
pub mod metrics;
pub mod server;

pub use ldap3::{self, SearchEntry};

pub use crate::{
	collector::Collector,
	config::{Config, LdapConfig},
	cookie::SyncCookie,
	directory::{Directory, DirectorySession, LdapDirectory},
	entry::SearchEntryExt,
	error::Error,
	metrics::Metrics,
};
