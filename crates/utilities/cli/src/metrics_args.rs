//! Prometheus exporter arguments.

use crate::{CliResult, init_prometheus_server};
use clap::Args;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default port of the metrics endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Configuration of the Prometheus metrics endpoint.
#[derive(Args, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsArgs {
    /// Serve Prometheus metrics.
    #[arg(
        id = "metrics_enabled",
        long = "metrics.enabled",
        env = "METRICS_ENABLED",
        default_value_t = false,
        global = true
    )]
    pub enabled: bool,
    /// Address the metrics endpoint binds to.
    #[arg(
        id = "metrics_addr",
        long = "metrics.addr",
        env = "METRICS_ADDR",
        default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        global = true
    )]
    pub addr: IpAddr,
    /// Port of the metrics endpoint. `0` picks a free port.
    #[arg(
        id = "metrics_port",
        long = "metrics.port",
        env = "METRICS_PORT",
        default_value_t = DEFAULT_METRICS_PORT,
        global = true
    )]
    pub port: u16,
}

impl Default for MetricsArgs {
    fn default() -> Self {
        Self { enabled: false, addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: DEFAULT_METRICS_PORT }
    }
}

impl MetricsArgs {
    /// Starts the exporter if enabled, returning the address it serves on.
    pub fn init_metrics(&self) -> CliResult<Option<SocketAddr>> {
        if !self.enabled {
            return Ok(None);
        }
        Ok(Some(init_prometheus_server(self.addr, self.port)?))
    }
}
