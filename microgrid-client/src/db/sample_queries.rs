use anyhow::Result;
use futures::stream::BoxStream;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::{Sample, TimeWindow};

/// Table holding ingested microgrid telemetry.
pub const SAMPLES_TABLE: &str = "microgrid_samples";

// One statement per bound combination so the SQL stays `'static` and the
// returned stream does not borrow a locally built string.
const SELECT_ALL: &str = r#"
    SELECT ts, battery_power, pv_power, fuel_cell_power, grid_exchange_power, bus_voltage, bus_frequency
    FROM microgrid_samples
    ORDER BY ts
"#;

const SELECT_FROM: &str = r#"
    SELECT ts, battery_power, pv_power, fuel_cell_power, grid_exchange_power, bus_voltage, bus_frequency
    FROM microgrid_samples
    WHERE ts >= $1
    ORDER BY ts
"#;

const SELECT_UNTIL: &str = r#"
    SELECT ts, battery_power, pv_power, fuel_cell_power, grid_exchange_power, bus_voltage, bus_frequency
    FROM microgrid_samples
    WHERE ts <= $1
    ORDER BY ts
"#;

const SELECT_BETWEEN: &str = r#"
    SELECT ts, battery_power, pv_power, fuel_cell_power, grid_exchange_power, bus_voltage, bus_frequency
    FROM microgrid_samples
    WHERE ts >= $1
      AND ts <= $2
    ORDER BY ts
"#;

fn window_sql(window: &TimeWindow) -> &'static str {
    match (window.start.is_some(), window.end.is_some()) {
        (false, false) => SELECT_ALL,
        (true, false) => SELECT_FROM,
        (false, true) => SELECT_UNTIL,
        (true, true) => SELECT_BETWEEN,
    }
}

/// Stream the samples of `window` in ascending timestamp order.
pub fn stream_window<'a>(
    pool: &'a PgPool,
    window: &TimeWindow,
) -> BoxStream<'a, Result<Sample, sqlx::Error>> {
    let mut query = sqlx::query_as::<_, Sample>(window_sql(window));
    if let Some(start) = window.start {
        query = query.bind(start);
    }
    if let Some(end) = window.end {
        query = query.bind(end);
    }
    query.fetch(pool)
}

/// Fetch the whole window at once. Prefer [`stream_window`] for long ranges.
pub async fn fetch_window(pool: &PgPool, window: &TimeWindow) -> Result<Vec<Sample>> {
    let mut query = sqlx::query_as::<_, Sample>(window_sql(window));
    if let Some(start) = window.start {
        query = query.bind(start);
    }
    if let Some(end) = window.end {
        query = query.bind(end);
    }
    let rows = query.fetch_all(pool).await?;

    Ok(rows)
}

/// Insert a batch of samples with a single multi-row statement.
pub async fn insert_samples(pool: &PgPool, batch: &[Sample]) -> Result<u64> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut builder = QueryBuilder::<Postgres>::new(
        "INSERT INTO microgrid_samples (ts, battery_power, pv_power, fuel_cell_power, grid_exchange_power, bus_voltage, bus_frequency) ",
    );

    builder.push_values(batch, |mut b, s| {
        b.push_bind(s.ts)
            .push_bind(s.battery_power)
            .push_bind(s.pv_power)
            .push_bind(s.fuel_cell_power)
            .push_bind(s.grid_exchange_power)
            .push_bind(s.bus_voltage)
            .push_bind(s.bus_frequency);
    });

    let result = builder.build().execute(pool).await?;
    Ok(result.rows_affected())
}
