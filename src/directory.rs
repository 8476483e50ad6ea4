//! Connecting to the directory server and the two queries a collection needs.

use std::io;

use async_trait::async_trait;
use ldap3::{
	adapters::{Adapter, EntriesOnly, PagedResults},
	LdapConnAsync, LdapError, Scope, SearchEntry,
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{config::LdapConfig, entry::SearchEntryExt, error::Error};

/// Attribute holding the sync cookies of the base entry.
pub const CONTEXT_CSN: &str = "contextCSN";
/// Filter matching every entry.
const ALL_OBJECTS: &str = "(objectClass=*)";
/// Attribute selector requesting no attributes at all (RFC 4511 4.5.1.8).
const NO_ATTRIBUTES: &str = "1.1";

/// Something that can hand out sessions against a directory server.
#[async_trait]
pub trait Directory: Send + Sync {
	/// The session type returned by [`Directory::connect`].
	type Session: DirectorySession;

	/// Open a transport and authenticate. On failure nothing stays open.
	async fn connect(&self) -> Result<Self::Session, Error>;
}

/// A live connection, exclusively owned by whoever opened it.
#[async_trait]
pub trait DirectorySession: Send {
	/// All `contextCSN` values of the entry at `base`.
	async fn sync_cookies(&mut self, base: &str) -> Result<Vec<String>, Error>;

	/// Number of entries in the subtree rooted at `base`, `base` included.
	async fn count_entries(&mut self, base: &str) -> Result<usize, Error>;

	/// Release the connection.
	async fn close(self);
}

/// [`Directory`] backed by an LDAP server reached through `ldap3`.
#[derive(Debug, Clone)]
pub struct LdapDirectory {
	/// Where and how to connect.
	config: LdapConfig,
}

impl LdapDirectory {
	/// Create a new [`LdapDirectory`] with the given configuration.
	#[must_use]
	pub fn new(config: LdapConfig) -> Self {
		Self { config }
	}
}

#[async_trait]
impl Directory for LdapDirectory {
	type Session = LdapSession;

	async fn connect(&self) -> Result<LdapSession, Error> {
		let settings = self.config.to_settings().await?;
		let url = self.config.url()?;
		debug!(%url, starttls = self.config.starttls, "Connecting to directory server");

		let (conn, ldap) = LdapConnAsync::from_url_with_settings(settings, &url)
			.await
			.map_err(|err| classify_connect_error(err, self.config.starttls))?;
		let driver = tokio::spawn(async move {
			if let Err(err) = conn.drive().await {
				warn!("Ldap connection error {err}");
			}
		});
		let mut session = LdapSession { ldap, driver, page_size: self.config.page_size };

		if self.config.bind {
			let bound = session
				.ldap
				.simple_bind(&self.config.bindcn, &self.config.bindpass)
				.await
				.and_then(ldap3::LdapResult::success);
			if let Err(err) = bound {
				session.close().await;
				return Err(Error::Bind(err));
			}
		}

		Ok(session)
	}
}

/// Sort a failure to establish the connection into transport and StartTLS
/// errors. Without StartTLS every failure is a transport failure. With it,
/// refused or timed out connections are transport failures, while a
/// rejected StartTLS request or a broken TLS handshake is an upgrade failure.
fn classify_connect_error(err: LdapError, starttls: bool) -> Error {
	if !starttls {
		return Error::Connect(err);
	}
	let upgrade_failed = match &err {
		LdapError::Io { source } => is_handshake_failure(source),
		LdapError::Timeout { .. } => false,
		_ => true,
	};
	if upgrade_failed {
		Error::StartTls(err)
	} else {
		Error::Connect(err)
	}
}

/// Whether an I/O error was raised by the TLS handshake rather than by the
/// TCP connection.
fn is_handshake_failure(err: &io::Error) -> bool {
	matches!(err.kind(), io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof)
		|| err.get_ref().is_some_and(|inner| inner.is::<rustls::Error>())
}

/// An open LDAP connection.
#[derive(Debug)]
pub struct LdapSession {
	/// Handle for issuing operations.
	ldap: ldap3::Ldap,
	/// Task driving the connection.
	driver: JoinHandle<()>,
	/// Page size for the subtree count.
	page_size: Option<i32>,
}

#[async_trait]
impl DirectorySession for LdapSession {
	async fn sync_cookies(&mut self, base: &str) -> Result<Vec<String>, Error> {
		let (entries, _res) = self
			.ldap
			.search(base, Scope::Base, ALL_OBJECTS, vec![CONTEXT_CSN])
			.await
			.and_then(ldap3::SearchResult::success)
			.map_err(Error::Search)?;

		Ok(entries
			.into_iter()
			.map(SearchEntry::construct)
			.flat_map(|entry| entry.attr_values(CONTEXT_CSN).to_vec())
			.collect())
	}

	async fn count_entries(&mut self, base: &str) -> Result<usize, Error> {
		let mut adapters: Vec<Box<dyn Adapter<_, _>>> = vec![Box::new(EntriesOnly::new())];
		if let Some(page_size) = self.page_size {
			adapters.push(Box::new(PagedResults::new(page_size)));
		}

		let mut search = self
			.ldap
			.streaming_search_with(adapters, base, Scope::Subtree, ALL_OBJECTS, vec![NO_ATTRIBUTES])
			.await
			.map_err(Error::Search)?;

		let mut count = 0;
		while search.next().await.map_err(Error::Search)?.is_some() {
			count += 1;
		}
		search.finish().await.success().map_err(Error::Search)?;

		Ok(count)
	}

	async fn close(mut self) {
		if let Err(err) = self.ldap.unbind().await {
			warn!("Unbinding from the directory server failed: {err}");
			self.driver.abort();
		}
		if let Err(err) = self.driver.await {
			if !err.is_cancelled() {
				warn!("Failed to join background task: {err}");
			}
		}
	}
}
