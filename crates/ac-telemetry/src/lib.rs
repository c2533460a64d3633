//! Observability for the autocommit daemon.
//!
//! - **Logging**: human-readable or JSON output via `tracing-subscriber`,
//!   filtered by `RUST_LOG` or the configured level.
//! - **Metrics**: counters, gauges and histograms for commit cycles, exported
//!   in Prometheus text format.

pub mod logging;
pub mod metrics;
