use microgrid_client::domain::KpiField;

use super::{format_value, RenderError, ReportMetadata, NO_DATA_MESSAGE};

pub(super) fn render(rows: Option<&[KpiField]>, meta: &ReportMetadata) -> Result<Vec<u8>, RenderError> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    let enc = |e: csv::Error| RenderError::Encoding(e.to_string());

    wtr.write_record(["Report:", meta.name.as_str()]).map_err(enc)?;
    wtr.write_record(["Period:", meta.period().as_str()]).map_err(enc)?;
    wtr.write_record(["Generated:", meta.generated().as_str()]).map_err(enc)?;
    wtr.write_record([""]).map_err(enc)?;

    match rows {
        Some(rows) => {
            wtr.write_record(["KPI", "Value", "Unit"]).map_err(enc)?;
            for field in rows {
                wtr.write_record([field.name, format_value(field).as_str(), field.unit.symbol()])
                    .map_err(enc)?;
            }
        }
        None => wtr.write_record([NO_DATA_MESSAGE]).map_err(enc)?,
    }

    wtr.into_inner().map_err(|e| RenderError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{render::tests::{meta, record}, ReportFormat};

    #[test]
    fn output_is_parseable_with_one_row_per_field() {
        let record = record();
        let fields = record.fields();
        let bytes = render(Some(&fields), &meta(ReportFormat::Csv)).unwrap();

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let rows: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>().unwrap();

        assert_eq!(&rows[0][1], "Weekly plant summary");
        let header = rows.iter().position(|r| &r[0] == "KPI").unwrap();
        let kpis = &rows[header + 1..];
        assert_eq!(kpis.len(), 12);
        assert_eq!(&kpis[4][0], "peak_consumption_kw");
        assert_eq!(&kpis[4][1], "14.00");
        assert_eq!(&kpis[4][2], "kW");
    }
}
