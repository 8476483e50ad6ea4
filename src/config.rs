//! Config for the exporter.
use std::{
	fmt,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use ldap3::LdapConnSettings;
use rustls::{ClientConfig, RootCertStore};
use serde::Deserialize;
use url::Url;

use crate::error::Error;

/// Exporter configuration, usually read from a YAML file.
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
	/// How to reach and authenticate against the directory server.
	pub ldap: LdapConfig,
	/// Seconds to wait between the end of one collection and the start of
	/// the next.
	pub poll_interval: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self { ldap: LdapConfig::default(), poll_interval: 60 }
	}
}

impl Config {
	/// Read the configuration from a YAML file. Keys missing from the file
	/// keep their default values.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
		let contents = std::fs::read_to_string(path)?;
		Self::from_yaml(&contents)
	}

	/// Parse the configuration from a YAML document.
	pub fn from_yaml(contents: &str) -> Result<Self, Error> {
		if contents.trim().is_empty() {
			return Ok(Self::default());
		}
		let config: Self = serde_yaml::from_str(contents)?;
		if config.poll_interval == 0 {
			return Err(Error::Invalid("poll_interval must be at least 1 second".to_owned()));
		}
		Ok(config)
	}

	/// The delay between two collection cycles.
	#[must_use]
	pub fn poll_interval(&self) -> Duration {
		Duration::from_secs(self.poll_interval)
	}
}

/// Connection and authentication settings for the directory server.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct LdapConfig {
	/// Hostname or address of the server.
	pub host: String,
	/// Port of the server.
	pub port: String,
	/// Entry holding the `contextCSN` attribute, also the base of the
	/// subtree that gets counted.
	pub basedn: String,
	/// Connect in plain text and upgrade with the StartTLS extended
	/// operation, rather than TLS on a dedicated port.
	pub starttls: bool,
	/// Perform a simple bind with `bindcn` and `bindpass` after connecting.
	pub bind: bool,
	/// DN to bind as.
	pub bindcn: String,
	/// Password for `bindcn`.
	pub bindpass: String,
	/// Disable verification of the server certificate. Directory servers
	/// are often deployed with self-signed certificates; this has to be
	/// opted into explicitly.
	pub insecure_skip_verify: bool,
	/// PEM file with root certificates to trust instead of the platform
	/// defaults.
	pub root_certificates_path: Option<PathBuf>,
	/// Timeout to establish a connection in seconds. 0 disables it.
	pub timeout: u64,
	/// If set, the subtree count uses the [simple paged results control]
	/// with the given page size
	///
	/// [simple paged results control]: https://www.rfc-editor.org/rfc/rfc2696.html
	pub page_size: Option<i32>,
}

impl Default for LdapConfig {
	fn default() -> Self {
		Self {
			host: "localhost".to_owned(),
			port: "636".to_owned(),
			basedn: "dc=example,dc=org".to_owned(),
			starttls: false,
			bind: false,
			bindcn: String::new(),
			bindpass: String::new(),
			insecure_skip_verify: false,
			root_certificates_path: None,
			timeout: 10,
			page_size: None,
		}
	}
}

impl fmt::Debug for LdapConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LdapConfig")
			.field("host", &self.host)
			.field("port", &self.port)
			.field("basedn", &self.basedn)
			.field("starttls", &self.starttls)
			.field("bind", &self.bind)
			.field("bindcn", &self.bindcn)
			.field("bindpass", &"<redacted>")
			.field("insecure_skip_verify", &self.insecure_skip_verify)
			.field("root_certificates_path", &self.root_certificates_path)
			.field("timeout", &self.timeout)
			.field("page_size", &self.page_size)
			.finish()
	}
}

impl LdapConfig {
	/// The URL to connect to. StartTLS starts out on a plain `ldap`
	/// connection, everything else uses `ldaps`.
	pub fn url(&self) -> Result<Url, Error> {
		let scheme = if self.starttls { "ldap" } else { "ldaps" };
		let url = Url::parse(&format!("{scheme}://{}:{}", self.host, self.port))
			.map_err(|err| Error::Invalid(format!("{}:{}: {err}", self.host, self.port)))?;
		if url.host_str().map_or(true, str::is_empty) {
			return Err(Error::Invalid("ldap.host must not be empty".to_owned()));
		}
		Ok(url)
	}

	/// Create a [`LdapConnSettings`] based on this [`LdapConfig`]
	pub(crate) async fn to_settings(&self) -> Result<LdapConnSettings, Error> {
		let mut settings = LdapConnSettings::new();

		if self.timeout > 0 {
			settings = settings.set_conn_timeout(Duration::from_secs(self.timeout));
		}
		settings = settings.set_starttls(self.starttls);
		settings = settings.set_no_tls_verify(self.insecure_skip_verify);

		if self.insecure_skip_verify {
			return Ok(settings);
		}

		if let Some(path) = &self.root_certificates_path {
			let pem = tokio::fs::read(path).await?;
			let certificates = rustls_pemfile::certs(&mut pem.as_slice())
				.map_err(|err| Error::Tls(format!("{}: {err}", path.display())))?;

			let mut roots = RootCertStore::empty();
			let (added, _ignored) = roots.add_parsable_certificates(&certificates);
			if added == 0 {
				return Err(Error::Tls(format!(
					"{} does not contain any usable certificates",
					path.display()
				)));
			}

			let config = ClientConfig::builder()
				.with_safe_defaults()
				.with_root_certificates(roots)
				.with_no_client_auth();
			settings = settings.set_config(Arc::new(config));
		}
		Ok(settings)
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used)]

	use std::{io::ErrorKind, path::PathBuf};

	use super::{Config, LdapConfig};
	use crate::error::Error;

	#[test]
	fn defaults() {
		let config = Config::default();
		assert_eq!(config.ldap.host, "localhost");
		assert_eq!(config.ldap.port, "636");
		assert_eq!(config.ldap.basedn, "dc=example,dc=org");
		assert!(!config.ldap.starttls);
		assert!(!config.ldap.bind);
		assert!(config.ldap.bindcn.is_empty());
		assert!(config.ldap.bindpass.is_empty());
		assert!(!config.ldap.insecure_skip_verify, "Certificate checks must be on by default");
		assert_eq!(config.poll_interval().as_secs(), 60);
	}

	#[test]
	fn partial_yaml() -> Result<(), Box<dyn std::error::Error>> {
		let config = Config::from_yaml(
			"ldap:\n  host: ldap.example.org\n  port: \"389\"\n  starttls: true\n  bind: true\n  bindcn: cn=monitor,dc=example,dc=org\n  bindpass: secret\n",
		)?;
		assert_eq!(config.ldap.host, "ldap.example.org");
		assert_eq!(config.ldap.port, "389");
		assert!(config.ldap.starttls);
		assert!(config.ldap.bind);
		assert_eq!(config.ldap.bindcn, "cn=monitor,dc=example,dc=org");
		assert_eq!(config.ldap.bindpass, "secret");
		assert_eq!(config.ldap.basedn, "dc=example,dc=org", "Missing keys keep their defaults");
		assert_eq!(config.poll_interval, 60);
		Ok(())
	}

	#[test]
	fn empty_yaml() -> Result<(), Box<dyn std::error::Error>> {
		let config = Config::from_yaml("\n")?;
		assert_eq!(config.ldap.host, "localhost");
		Ok(())
	}

	#[test]
	fn malformed_yaml() {
		assert!(matches!(Config::from_yaml("ldap:\n  bind: maybe\n"), Err(Error::Yaml(_))));
		assert!(matches!(Config::from_yaml("ldap: [1, 2"), Err(Error::Yaml(_))));
	}

	#[test]
	fn zero_poll_interval() {
		assert!(matches!(Config::from_yaml("poll_interval: 0\n"), Err(Error::Invalid(_))));
		let config = Config::from_yaml("poll_interval: 1\n").unwrap();
		assert_eq!(config.poll_interval(), std::time::Duration::from_secs(1));
	}

	#[test]
	fn password_not_logged() {
		let config = Config {
			ldap: LdapConfig {
				bindcn: "cn=admin,dc=example,dc=org".to_owned(),
				bindpass: "hunter2".to_owned(),
				..LdapConfig::default()
			},
			..Config::default()
		};
		let debug = format!("{config:?}");
		assert!(!debug.contains("hunter2"));
		assert!(debug.contains("<redacted>"));
		assert!(debug.contains("cn=admin,dc=example,dc=org"));
	}

	#[test]
	fn missing_file() {
		assert!(matches!(
			Config::load("does/not/exist.yaml"),
			Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound
		));
	}

	#[test]
	fn url_scheme() -> Result<(), Box<dyn std::error::Error>> {
		let mut config = LdapConfig::default();
		assert_eq!(config.url()?.as_str(), "ldaps://localhost:636");

		config.starttls = true;
		config.port = "389".to_owned();
		assert_eq!(config.url()?.as_str(), "ldap://localhost:389");

		config.port = "not-a-port".to_owned();
		assert!(matches!(config.url(), Err(Error::Invalid(_))));

		config.port = "389".to_owned();
		config.host = String::new();
		assert!(matches!(config.url(), Err(Error::Invalid(_))));
		Ok(())
	}

	#[tokio::test]
	async fn root_certificates() {
		// invalid path test
		let config = LdapConfig {
			root_certificates_path: Some(PathBuf::from("invalid_path")),
			..LdapConfig::default()
		};
		assert!(matches!(
			config.to_settings().await.err().unwrap(),
			Error::Io(io_err) if io_err.kind() == ErrorKind::NotFound
		));

		// not a certificate
		let config = LdapConfig {
			root_certificates_path: Some(PathBuf::from("src/config.rs")),
			..LdapConfig::default()
		};
		assert!(matches!(config.to_settings().await.err().unwrap(), Error::Tls(_)));

		// verification disabled, the certificates are never read
		let config = LdapConfig {
			root_certificates_path: Some(PathBuf::from("invalid_path")),
			insecure_skip_verify: true,
			..LdapConfig::default()
		};
		assert!(config.to_settings().await.is_ok());
	}
}
