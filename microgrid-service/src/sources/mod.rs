pub mod sample_csv_file;

pub use sample_csv_file::{parse_utc_offset, samples_from_reader, SampleCsvFileSource};
