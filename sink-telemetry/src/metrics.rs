use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Port of the Prometheus scrape endpoint when none is given.
pub const DEFAULT_METRICS_PORT: u16 = 9000;

/// Installs the global Prometheus recorder with an HTTP listener on `[::]:{port}/metrics`.
///
/// Must be called from within a tokio runtime because the listener is spawned on it. The
/// `app` global label is attached to every metric so several sinks can share one scraper.
pub fn init_metrics(app_name: &str, port: Option<u16>) -> Result<(), BuildError> {
    let address = SocketAddr::new(
        IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        port.unwrap_or(DEFAULT_METRICS_PORT),
    );

    PrometheusBuilder::new()
        .with_http_listener(address)
        .add_global_label("app", app_name)
        .install()
}
