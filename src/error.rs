//! Error codes

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// A file could not be read.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The configuration file is not valid YAML or has fields of the wrong
	/// type.
	#[error("Malformed configuration: {0}")]
	Yaml(#[from] serde_yaml::Error),
	/// A configuration value is not usable.
	#[error("Invalid configuration: {0}")]
	Invalid(String),
	/// TLS trust material could not be loaded.
	#[error("TLS setup failed: {0}")]
	Tls(String),
	/// The transport to the directory server could not be established.
	#[error("Could not connect to the directory server: {0}")]
	Connect(#[source] ldap3::LdapError),
	/// The plain transport was established but upgrading it with StartTLS
	/// failed.
	#[error("StartTLS upgrade failed: {0}")]
	StartTls(#[source] ldap3::LdapError),
	/// The server rejected the configured bind credentials.
	#[error("Bind failed: {0}")]
	Bind(#[source] ldap3::LdapError),
	/// A search request failed or returned a non-success result code.
	#[error("Search failed: {0}")]
	Search(#[source] ldap3::LdapError),
}
