pub mod db;
pub mod domain;
pub mod kpi;

pub use domain::{Channel, KpiRecord, KpiUnit, Sample, TimeWindow};
pub use kpi::{compute, compute_stream, KpiError};
