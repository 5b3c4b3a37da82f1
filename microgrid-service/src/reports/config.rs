use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime};
use uuid::Uuid;

use super::ReportError;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    #[serde(rename = "pdf")]
    Pdf,
    #[serde(rename = "md")]
    Markdown,
    #[serde(rename = "csv")]
    Csv,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Markdown => "md",
            ReportFormat::Csv => "csv",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Markdown => "text/markdown",
            ReportFormat::Csv => "text/csv",
        }
    }
}

/// Report flavour chosen by the user. Every flavour renders the same KPI
/// table; the value is kept as configuration metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Kpi,
    Electrical,
    Production,
    Consumption,
    #[default]
    Comprehensive,
}

fn default_include_charts() -> bool {
    true
}

/// Reporting period, resolved against the current UTC date when a job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "preset")]
pub enum DateRangePreset {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "yesterday")]
    Yesterday,
    #[default]
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "this_month")]
    ThisMonth,
    #[serde(rename = "custom")]
    Custom {
        #[serde(with = "iso_date")]
        start: Date,
        #[serde(with = "iso_date")]
        end: Date,
    },
}

impl DateRangePreset {
    /// Inclusive `(start, end)` dates for a job running on `today`.
    ///
    /// The rolling presets end today and reach back the full count of days,
    /// so `last_7_days` spans eight calendar dates.
    pub fn resolve(self, today: Date) -> (Date, Date) {
        match self {
            DateRangePreset::Today => (today, today),
            DateRangePreset::Yesterday => {
                let day = today - Duration::DAY;
                (day, day)
            }
            DateRangePreset::Last7Days => (today - Duration::days(7), today),
            DateRangePreset::Last30Days => (today - Duration::days(30), today),
            DateRangePreset::ThisMonth => (today - Duration::days(i64::from(today.day()) - 1), today),
            DateRangePreset::Custom { start, end } => (start, end),
        }
    }
}

/// Request body for creating or replacing a configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NewReportConfiguration {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub report_type: ReportType,
    pub format: ReportFormat,
    #[serde(default = "default_include_charts")]
    pub include_charts: bool,
    #[serde(default)]
    pub date_range: DateRangePreset,
}

impl NewReportConfiguration {
    pub fn validate(&self) -> Result<(), ReportError> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(ReportError::InvalidConfiguration(
                "name must be between 1 and 100 characters".to_string(),
            ));
        }
        if let DateRangePreset::Custom { start, end } = self.date_range {
            if start > end {
                return Err(ReportError::InvalidConfiguration(format!(
                    "custom range starts {start} after it ends {end}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportConfiguration {
    pub id: Uuid,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub report_type: ReportType,
    pub format: ReportFormat,
    pub include_charts: bool,
    pub date_range: DateRangePreset,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ReportConfiguration {
    pub fn new(owner: impl Into<String>, request: NewReportConfiguration, now: OffsetDateTime) -> Self {
        let mut config = Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: String::new(),
            description: String::new(),
            report_type: ReportType::default(),
            format: request.format,
            include_charts: true,
            date_range: DateRangePreset::default(),
            created_at: now,
            updated_at: now,
        };
        config.replace(request, now);
        config
    }

    /// Overwrite every user-editable field. Identity, owner and creation
    /// time are kept.
    pub fn replace(&mut self, request: NewReportConfiguration, now: OffsetDateTime) {
        self.name = request.name.trim().to_string();
        self.description = request.description;
        self.report_type = request.report_type;
        self.format = request.format;
        self.include_charts = request.include_charts;
        self.date_range = request.date_range;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn presets_resolve_against_today() {
        let today = date!(2024-03-15);

        assert_eq!(DateRangePreset::Today.resolve(today), (today, today));
        assert_eq!(
            DateRangePreset::Yesterday.resolve(today),
            (date!(2024-03-14), date!(2024-03-14))
        );
        assert_eq!(DateRangePreset::Last7Days.resolve(today), (date!(2024-03-08), today));
        assert_eq!(DateRangePreset::Last30Days.resolve(today), (date!(2024-02-14), today));
        assert_eq!(DateRangePreset::ThisMonth.resolve(today), (date!(2024-03-01), today));
    }

    #[test]
    fn this_month_on_the_first_is_a_single_day() {
        let today = date!(2024-03-01);
        assert_eq!(DateRangePreset::ThisMonth.resolve(today), (today, today));
    }

    #[test]
    fn presets_use_their_wire_names() {
        let json = serde_json::to_value(DateRangePreset::Last7Days).unwrap();
        assert_eq!(json, serde_json::json!({ "preset": "last_7_days" }));

        let custom: DateRangePreset = serde_json::from_value(serde_json::json!({
            "preset": "custom",
            "start": "2024-01-01",
            "end": "2024-01-31"
        }))
        .unwrap();
        assert_eq!(
            custom,
            DateRangePreset::Custom {
                start: date!(2024-01-01),
                end: date!(2024-01-31)
            }
        );
    }

    #[test]
    fn inverted_custom_range_is_invalid() {
        let request = NewReportConfiguration {
            name: "Weekly".to_string(),
            description: String::new(),
            report_type: ReportType::Kpi,
            format: ReportFormat::Csv,
            include_charts: false,
            date_range: DateRangePreset::Custom {
                start: date!(2024-02-01),
                end: date!(2024-01-01),
            },
        };
        assert!(matches!(request.validate(), Err(ReportError::InvalidConfiguration(_))));
    }

    #[test]
    fn omitted_metadata_takes_defaults() {
        let request: NewReportConfiguration = serde_json::from_value(serde_json::json!({
            "name": "Daily",
            "format": "pdf"
        }))
        .unwrap();
        assert_eq!(request.report_type, ReportType::Comprehensive);
        assert!(request.include_charts);
        assert_eq!(request.date_range, DateRangePreset::Last7Days);

        let typed: NewReportConfiguration = serde_json::from_value(serde_json::json!({
            "name": "Daily",
            "format": "pdf",
            "report_type": "electrical",
            "include_charts": false
        }))
        .unwrap();
        assert_eq!(typed.report_type, ReportType::Electrical);
        assert!(!typed.include_charts);
    }

    #[test]
    fn replace_keeps_identity_and_creation_time() {
        let created = time::macros::datetime!(2024-01-01 00:00:00 UTC);
        let edited = time::macros::datetime!(2024-01-02 00:00:00 UTC);
        let mut config: ReportConfiguration = ReportConfiguration::new(
            "alice",
            serde_json::from_value(serde_json::json!({ "name": "Daily", "format": "pdf" })).unwrap(),
            created,
        );
        let id = config.id;

        config.replace(
            serde_json::from_value(serde_json::json!({
                "name": "  Monthly ",
                "format": "csv",
                "date_range": { "preset": "this_month" }
            }))
            .unwrap(),
            edited,
        );

        assert_eq!(config.id, id);
        assert_eq!(config.owner, "alice");
        assert_eq!(config.name, "Monthly");
        assert_eq!(config.format, ReportFormat::Csv);
        assert_eq!(config.date_range, DateRangePreset::ThisMonth);
        assert_eq!(config.created_at, created);
        assert_eq!(config.updated_at, edited);
    }

    #[test]
    fn formats_map_to_extension_and_content_type() {
        assert_eq!(ReportFormat::Markdown.extension(), "md");
        assert_eq!(ReportFormat::Pdf.content_type(), "application/pdf");
        assert_eq!(serde_json::to_value(ReportFormat::Markdown).unwrap(), "md");
    }
}
