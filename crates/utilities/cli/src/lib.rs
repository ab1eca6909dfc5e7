//! Utilities shared by the cadence command line binaries.
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod backtrace;

mod error;
pub use error::{CliError, CliResult, PrometheusError};

pub mod log;
pub use log::{LogArgs, LogLevel, init_tracing_subscriber};

pub mod metrics_args;
pub use metrics_args::MetricsArgs;

mod prometheus;
pub use prometheus::init_prometheus_server;

mod styles;
pub use styles::cli_styles;
