//! Prometheus metrics endpoint and HTTP metrics middleware

pub mod handlers;
pub mod middleware;
pub mod recorder;

pub use handlers::*;
pub use middleware::http_metrics_middleware;
pub use recorder::install_prometheus_recorder;
