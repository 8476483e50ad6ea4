//! HTTP endpoints: the metrics page and a small landing page linking to it.
use std::{
	net::{SocketAddr, ToSocketAddrs},
	sync::Arc,
};

use axum::{
	extract::State,
	http::header,
	response::{Html, IntoResponse},
	routing::get,
	Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{error::Error, metrics::Metrics};

/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Shared handler state.
#[derive(Debug, Clone)]
struct AppState {
	/// Registry rendered on each scrape.
	metrics: Arc<Metrics>,
	/// Path the metrics are served on, linked from the landing page.
	metrics_path: Arc<str>,
}

/// Build the router serving `metrics` on `metrics_path` and the landing page
/// on `/`.
pub fn router(metrics: Arc<Metrics>, metrics_path: &str) -> Result<Router, Error> {
	if !metrics_path.starts_with('/') || metrics_path == "/" {
		return Err(Error::Invalid(format!(
			"metrics path {metrics_path:?} must start with '/' and not be the root"
		)));
	}
	if metrics_path.contains(|c: char| c.is_whitespace() || "\"'<>".contains(c)) {
		return Err(Error::Invalid(format!("metrics path {metrics_path:?} contains invalid characters")));
	}

	let state = AppState { metrics, metrics_path: metrics_path.into() };
	Ok(Router::new()
		.route("/", get(index))
		.route(metrics_path, get(scrape))
		.layer(TraceLayer::new_for_http())
		.with_state(state))
}

/// Landing page.
async fn index(State(state): State<AppState>) -> Html<String> {
	Html(format!(
		"<html>
<head><title>OpenLDAP Exporter</title></head>
<body>
<h1>OpenLDAP Exporter</h1>
<p><a href='{}'>Metrics</a></p>
</body>
</html>
",
		state.metrics_path
	))
}

/// Current values of all series.
async fn scrape(State(state): State<AppState>) -> impl IntoResponse {
	([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], state.metrics.render())
}

/// Resolve a listen address. An empty host, as in `:9328`, listens on all
/// IPv4 interfaces.
pub fn parse_listen_address(address: &str) -> Result<SocketAddr, Error> {
	let address =
		if address.starts_with(':') { format!("0.0.0.0{address}") } else { address.to_owned() };
	address
		.to_socket_addrs()
		.map_err(|err| Error::Invalid(format!("listen address {address:?}: {err}")))?
		.next()
		.ok_or_else(|| Error::Invalid(format!("listen address {address:?} does not resolve")))
}

/// Serve `router` on `address` until the listener fails.
pub async fn serve(address: SocketAddr, router: Router) -> Result<(), Error> {
	let listener = TcpListener::bind(address).await?;
	info!("Starting OpenLDAP exporter on {}", listener.local_addr()?);
	axum::serve(listener, router).await?;
	Ok(())
}
