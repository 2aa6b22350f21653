//! Observability for gridsentry
//!
//! 1. **Structured logs** via `tracing`, initialised by [`init_tracing`]
//! 2. **Prometheus metrics** held in a [`Metrics`] registry and rendered on demand
//!
//! Nothing here listens on a socket; callers decide where rendered metrics go.

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use metrics::Metrics;
