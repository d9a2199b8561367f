// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod article;
pub mod config;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod publish;
pub mod review;
pub mod rewrite;
pub mod throttle;

pub use crate::api::router;
pub use crate::article::{Candidate, Category};
pub use crate::pipeline::{CandidateSource, Pipeline};
pub use crate::review::ReviewService;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tech_pulse_pipeline=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}
