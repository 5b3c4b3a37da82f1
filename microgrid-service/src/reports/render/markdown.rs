use std::fmt::Write;

use microgrid_client::domain::KpiField;

use super::{format_value, ReportMetadata, NO_DATA_MESSAGE};

pub(super) fn render(rows: Option<&[KpiField]>, meta: &ReportMetadata) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "# {}\n", single_line(&meta.name));
    let _ = writeln!(out, "**Period:** {}\n", meta.period());
    let _ = writeln!(out, "**Generated:** {}\n", meta.generated());
    let _ = writeln!(out, "## Key Performance Indicators\n");

    match rows {
        Some(rows) => {
            out.push_str("| KPI | Value | Unit |\n|-----|-------|------|\n");
            for field in rows {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} |",
                    field.name,
                    format_value(field),
                    field.unit.symbol()
                );
            }
        }
        None => {
            let _ = writeln!(out, "{NO_DATA_MESSAGE}");
        }
    }

    out
}

/// A heading must stay on one line or the rest of the name becomes body text.
fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::{render::tests::{meta, record}, ReportFormat};

    #[test]
    fn table_rows_follow_field_order() {
        let record = record();
        let fields = record.fields();
        let out = render(Some(&fields), &meta(ReportFormat::Markdown));

        assert!(out.starts_with("# Weekly plant summary\n"));
        assert!(out.contains("**Period:** 2024-03-08 to 2024-03-15"));

        let rows: Vec<&str> = out.lines().filter(|l| l.starts_with("| ") && !l.starts_with("| KPI")).collect();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0], "| total_consumption_kwh | 120.50 | kWh |");
        assert_eq!(rows[2], "| autonomy_pct | 81.54 | % |");
        assert_eq!(rows[11], "| mean_frequency | 50.00 | Hz |");
    }

    #[test]
    fn multi_line_name_stays_in_the_heading() {
        let mut meta = meta(ReportFormat::Markdown);
        meta.name = "Plant A\r\n# injected\nsummary".to_string();
        let out = render(None, &meta);

        assert!(out.starts_with("# Plant A # injected summary\n"));
        assert_eq!(out.lines().filter(|l| l.starts_with('#')).count(), 2);
    }
}
