//! Utilities for spinning up a prometheus metrics server.

use crate::PrometheusError;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{IpAddr, SocketAddr, TcpListener};
use tracing::info;

/// Starts a Prometheus metrics server on the given address and installs it as the global
/// metrics recorder. Returns the address the server listens on.
///
/// Port `0` asks the OS for a free port.
pub fn init_prometheus_server(addr: IpAddr, port: u16) -> Result<SocketAddr, PrometheusError> {
    let socket = if port == 0 {
        // The exporter binds its own listener, so the probe is dropped right away.
        TcpListener::bind((addr, 0))?.local_addr()?
    } else {
        SocketAddr::from((addr, port))
    };

    PrometheusBuilder::new().with_http_listener(socket).install()?;

    info!(target: "prometheus", "Serving metrics at: http://{socket}");
    Ok(socket)
}
