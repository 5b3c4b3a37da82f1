use std::{fs::File, io::Read, path::PathBuf};

use csv::ByteRecord;
use microgrid_client::{Channel, Sample};
use time::{
    format_description::{well_known::Rfc3339, FormatItem},
    macros::format_description,
    OffsetDateTime, PrimitiveDateTime, UtcOffset,
};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

const NAIVE_FORMATS: &[&[FormatItem<'static>]] = &[
    format_description!("[year]/[month]/[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]/[month]/[day] [hour]:[minute]"),
];

/// Header spellings accepted for each column: the plant export name, its
/// snake_case form and the storage column name.
const TIMESTAMP_HEADERS: &[&str] = &["Timestamp", "timestamp", "ts"];

fn channel_headers(channel: Channel) -> &'static [&'static str] {
    match channel {
        Channel::Battery => &["Battery_Active_Power", "battery_active_power", "battery_power"],
        Channel::Pv => &["PVPCS_Active_Power", "pvpcs_active_power", "pv_power"],
        Channel::FuelCell => &["FC_Active_Power", "fc_active_power", "fuel_cell_power"],
        Channel::GridExchange => &["GE_Active_Power", "ge_active_power", "grid_exchange_power"],
        Channel::BusVoltage => &["MG-LV-MSB_AC_Voltage", "mg_lv_msb_ac_voltage", "bus_voltage"],
        Channel::BusFrequency => &["MG-LV-MSB_Frequency", "mg_lv_msb_frequency", "bus_frequency"],
    }
}

/// CSV source for microgrid telemetry exports.
///
/// The timestamp column is required. Channel columns are optional; a
/// missing column, an empty cell or a non-numeric cell all read as a
/// missing measurement. Rows whose timestamp is empty or unparseable are
/// rejected individually without stopping the import.
pub struct SampleCsvFileSource {
    path: PathBuf,
    delimiter: u8,
    default_offset: UtcOffset,
}

impl SampleCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            delimiter: b',',
            default_offset: UtcOffset::UTC,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Offset assumed for timestamps written without one.
    pub fn with_default_offset(mut self, offset: UtcOffset) -> Self {
        self.default_offset = offset;
        self
    }
}

/// Parse a configured offset such as `+02:00` or `Z`.
pub fn parse_utc_offset(s: &str) -> Result<UtcOffset, PipelineError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(s, format_description!("[offset_hour sign:mandatory]:[offset_minute]"))
        .map_err(|e| PipelineError::Source(format!("invalid utc offset '{s}': {e}")))
}

fn parse_timestamp(raw: &str, default_offset: UtcOffset) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| PrimitiveDateTime::parse(raw, *fmt).ok())
        .map(|naive| naive.assume_offset(default_offset))
}

fn parse_optional_f64(field: Option<&[u8]>) -> Option<f64> {
    let s = std::str::from_utf8(field?).ok()?.trim();
    if s.is_empty() {
        None
    } else {
        s.parse().ok()
    }
}

#[derive(Debug, Clone)]
struct ColumnMap {
    ts: usize,
    channels: Vec<(Channel, usize)>,
}

impl ColumnMap {
    fn from_headers(headers: &ByteRecord) -> Result<Self, PipelineError> {
        let names: Vec<String> = headers
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();
        let find = |aliases: &[&str]| names.iter().position(|n| aliases.contains(&n.as_str()));

        let ts = find(TIMESTAMP_HEADERS).ok_or_else(|| {
            PipelineError::Source(format!(
                "missing timestamp column (expected one of {TIMESTAMP_HEADERS:?})"
            ))
        })?;

        let channels = Channel::ALL
            .into_iter()
            .filter_map(|channel| find(channel_headers(channel)).map(|idx| (channel, idx)))
            .collect();

        Ok(Self { ts, channels })
    }

    fn to_sample(&self, record: &ByteRecord, default_offset: UtcOffset) -> Result<Sample, PipelineError> {
        let raw_ts = record
            .get(self.ts)
            .map(String::from_utf8_lossy)
            .unwrap_or_default();
        let ts = parse_timestamp(&raw_ts, default_offset)
            .ok_or_else(|| PipelineError::Rejected(format!("invalid timestamp '{raw_ts}'")))?;

        let mut sample = Sample::new(ts);
        for &(channel, idx) in &self.channels {
            *sample.slot_mut(channel) = parse_optional_f64(record.get(idx));
        }
        Ok(sample)
    }
}

/// Stream samples out of any CSV reader. Fatal problems (unreadable header,
/// no timestamp column) end the stream with a `Source` error; bad rows are
/// yielded as `Rejected` and reading continues.
pub fn samples_from_reader<R>(reader: R, delimiter: u8, default_offset: UtcOffset) -> EnvelopeStream<Sample>
where
    R: Read + Send + 'static,
{
    let s = async_stream::stream! {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let columns = match rdr.byte_headers() {
            Ok(headers) => ColumnMap::from_headers(headers),
            Err(e) => Err(PipelineError::Source(format!("failed to read CSV headers: {e}"))),
        };
        let columns = match columns {
            Ok(c) => c,
            Err(e) => {
                yield Err(e);
                return;
            }
        };

        for result in rdr.byte_records() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    metrics::counter!("sample_csv_parse_errors_total").increment(1);
                    yield Err(PipelineError::Rejected(format!("failed to read CSV record: {e}")));
                    continue;
                }
            };
            let line = record.position().map_or(0, |p| p.line());

            match columns.to_sample(&record, default_offset) {
                Ok(sample) => {
                    yield Ok(Envelope::at_line(sample, line));
                }
                Err(e) => {
                    metrics::counter!("sample_csv_parse_errors_total").increment(1);
                    tracing::debug!(error = %e, line, "skipping CSV row");
                    yield Err(e);
                }
            }
        }
    };

    Box::pin(s)
}

#[async_trait::async_trait]
impl Source<Sample> for SampleCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<Sample> {
        // Blocking reads inside one task; acceptable for offline imports.
        match File::open(&self.path) {
            Ok(file) => samples_from_reader(file, self.delimiter, self.default_offset),
            Err(e) => {
                let err = PipelineError::Source(format!(
                    "failed to open CSV file {}: {e}",
                    self.path.display()
                ));
                Box::pin(futures::stream::once(async move { Err(err) }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Cursor;
    use time::macros::{datetime, offset};

    async fn collect(csv: &str, delimiter: u8, offset: UtcOffset) -> Vec<Result<Envelope<Sample>, PipelineError>> {
        samples_from_reader(Cursor::new(csv.as_bytes().to_vec()), delimiter, offset)
            .collect()
            .await
    }

    #[tokio::test]
    async fn plant_export_headers_are_mapped() {
        let csv = "Timestamp,Battery_Active_Power,PVPCS_Active_Power,FC_Active_Power,GE_Active_Power,MG-LV-MSB_AC_Voltage,MG-LV-MSB_Frequency,Outlet_Temperature\n\
                   2024/05/01 10:00:00,1.5,20.25,,8,401.2,50.01,12\n";

        let rows = collect(csv, b',', UtcOffset::UTC).await;
        assert_eq!(rows.len(), 1);
        let env = rows[0].as_ref().unwrap();
        let s = &env.payload;
        assert_eq!(s.ts, datetime!(2024-05-01 10:00:00 UTC));
        assert_eq!(s.battery_power, Some(1.5));
        assert_eq!(s.pv_power, Some(20.25));
        assert_eq!(s.fuel_cell_power, None);
        assert_eq!(s.grid_exchange_power, Some(8.0));
        assert_eq!(s.bus_voltage, Some(401.2));
        assert_eq!(s.bus_frequency, Some(50.01));
        assert_eq!(env.line, Some(2));
    }

    #[tokio::test]
    async fn bad_timestamps_are_rejected_per_row() {
        let csv = "timestamp;pv_power\n\
                   ;1\n\
                   not a date;2\n\
                   2024-05-01 10:15:00;3\n";

        let rows = collect(csv, b';', UtcOffset::UTC).await;
        assert_eq!(rows.len(), 3);
        assert!(matches!(rows[0], Err(PipelineError::Rejected(_))));
        assert!(matches!(rows[1], Err(PipelineError::Rejected(_))));
        assert_eq!(rows[2].as_ref().unwrap().payload.pv_power, Some(3.0));
    }

    #[tokio::test]
    async fn naive_timestamps_take_the_default_offset() {
        let csv = "ts,pv_power\n2024-05-01 10:00:00,abc\n2024-05-01T08:00:00Z,1\n";

        let rows = collect(csv, b',', offset!(+2)).await;
        let first = &rows[0].as_ref().unwrap().payload;
        assert_eq!(first.ts, datetime!(2024-05-01 08:00:00 UTC));
        assert_eq!(first.pv_power, None);
        let second = &rows[1].as_ref().unwrap().payload;
        assert_eq!(second.ts, datetime!(2024-05-01 08:00:00 UTC));
    }

    #[tokio::test]
    async fn missing_timestamp_column_is_fatal() {
        let rows = collect("pv_power\n1\n", b',', UtcOffset::UTC).await;
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0], Err(PipelineError::Source(_))));
    }

    #[test]
    fn utc_offset_parsing() {
        assert_eq!(parse_utc_offset("+02:00").unwrap(), offset!(+2));
        assert_eq!(parse_utc_offset("-05:30").unwrap(), offset!(-5:30));
        assert_eq!(parse_utc_offset("Z").unwrap(), UtcOffset::UTC);
        assert!(parse_utc_offset("two").is_err());
    }
}
