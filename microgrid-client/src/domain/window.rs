use time::{macros::time, Date, OffsetDateTime};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("start date {start} is after end date {end}")]
    Inverted { start: Date, end: Date },
}

/// Inclusive instant bounds for a sample query. A missing bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl TimeWindow {
    /// Every stored sample.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Day-granular window: `start` from midnight UTC, `end` through the last
    /// nanosecond of that day.
    pub fn from_dates(start: Option<Date>, end: Option<Date>) -> Result<Self, WindowError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(WindowError::Inverted { start, end });
            }
        }

        Ok(Self {
            start: start.map(|d| d.midnight().assume_utc()),
            end: end.map(|d| d.with_time(time!(23:59:59.999_999_999)).assume_utc()),
        })
    }

    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}
