pub mod kpi_record;
pub mod sample;
pub mod window;

pub use kpi_record::{KpiField, KpiRecord, KpiUnit};
pub use sample::{Channel, Sample};
pub use window::{TimeWindow, WindowError};
