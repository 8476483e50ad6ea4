//! Command line entry point of the exporter.
use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use syncrepl_exporter::{server, Collector, Config, LdapDirectory, Metrics};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Prometheus exporter for OpenLDAP syncrepl state.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
	/// host:port to listen on for scrapes
	#[arg(long = "telemetry.addr", default_value = ":9328")]
	listen_address: String,

	/// URL path for surfacing collected metrics
	#[arg(long = "telemetry.path", default_value = "/metrics")]
	metrics_path: String,

	/// YAML file with the directory server settings
	#[arg(long = "config.file", default_value = "config.yaml")]
	config_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let args = Args::parse();
	let address = server::parse_listen_address(&args.listen_address)?;
	let config = Config::load(&args.config_file)
		.with_context(|| format!("loading {}", args.config_file.display()))?;
	info!(
		host = %config.ldap.host,
		port = %config.ldap.port,
		basedn = %config.ldap.basedn,
		starttls = config.ldap.starttls,
		bind = config.ldap.bind,
		bindcn = %config.ldap.bindcn,
		insecure_skip_verify = config.ldap.insecure_skip_verify,
		"Loaded configuration"
	);

	let metrics = Arc::new(Metrics::new());
	let router = server::router(metrics.clone(), &args.metrics_path)?;

	let collector =
		Collector::new(LdapDirectory::new(config.ldap.clone()), config.ldap.basedn.clone(), metrics);
	let interval = config.poll_interval();
	tokio::spawn(async move { collector.run(interval).await });

	server::serve(address, router).await.with_context(|| format!("serving on {address}"))?;
	Ok(())
}
