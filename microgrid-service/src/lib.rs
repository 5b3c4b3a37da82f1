pub mod api;
pub mod config;
pub mod ingest;
pub mod kpis;
pub mod metrics_server;
pub mod observability;
pub mod pipeline;
pub mod reports;
pub mod samples;
pub mod sinks;
pub mod sources;
pub mod store;
pub mod transform;

pub use pipeline::{Envelope, Pipeline};
