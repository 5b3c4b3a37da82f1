//! KPI engine: integrates instantaneous power readings over a time-ordered
//! sample window into energy totals, ratios, peaks and means.
//!
//! Integration is backward-looking and rectangular. Each sample's power is
//! held for the time elapsed since the previous sample. The first sample has
//! no predecessor and is credited with the mean of the other intervals, or
//! exactly one hour when it is the only sample in the window.

pub mod channel;

use std::borrow::Cow;

use futures::{Stream, StreamExt};
use time::OffsetDateTime;

use crate::domain::{Channel, KpiRecord, Sample};
use channel::ChannelAccumulator;

/// Interval credited to the only sample of a single-sample window.
pub const SINGLE_SAMPLE_DT_HOURS: f64 = 1.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum KpiError {
    #[error("non-finite {channel} value {value} in sample at {ts}")]
    DataIntegrity {
        ts: OffsetDateTime,
        channel: Channel,
        value: f64,
    },
    #[error("computed {metric} is not finite")]
    NonFiniteResult { metric: &'static str },
    #[error("sample at {ts} precedes previous sample at {previous}")]
    OutOfOrder {
        ts: OffsetDateTime,
        previous: OffsetDateTime,
    },
}

/// Compute KPIs for a window of samples.
///
/// Returns `Ok(None)` for an empty window. Input is expected in ascending
/// timestamp order; an unsorted slice is sorted on a private copy first.
pub fn compute(samples: &[Sample]) -> Result<Option<KpiRecord>, KpiError> {
    let ordered: Cow<'_, [Sample]> = if samples.windows(2).all(|w| w[0].ts <= w[1].ts) {
        Cow::Borrowed(samples)
    } else {
        tracing::warn!(
            samples = samples.len(),
            "KPI window not in timestamp order, sorting before integration"
        );
        let mut sorted = samples.to_vec();
        sorted.sort_by_key(|s| s.ts);
        Cow::Owned(sorted)
    };

    let mut acc = WindowAccumulator::default();
    for sample in ordered.iter() {
        acc.push(sample)?;
    }
    acc.finish()
}

/// Compute KPIs from a stream of samples in a single pass.
///
/// The stream must already be in ascending order; a sample older than its
/// predecessor aborts with [`KpiError::OutOfOrder`].
pub async fn compute_stream<S, E>(stream: S) -> Result<Option<KpiRecord>, E>
where
    S: Stream<Item = Result<Sample, E>>,
    E: From<KpiError>,
{
    futures::pin_mut!(stream);

    let mut acc = WindowAccumulator::default();
    while let Some(item) = stream.next().await {
        acc.push(&item?)?;
    }
    Ok(acc.finish()?)
}

/// Running state of a window being integrated.
#[derive(Debug, Clone, Default)]
pub struct WindowAccumulator {
    first_ts: Option<OffsetDateTime>,
    last_ts: Option<OffsetDateTime>,
    count: u64,
    battery: ChannelAccumulator,
    pv: ChannelAccumulator,
    fuel_cell: ChannelAccumulator,
    grid_exchange: ChannelAccumulator,
    voltage: ChannelAccumulator,
    frequency: ChannelAccumulator,
    // battery + pv + fuel cell per sample, nulls filled with zero
    combined_production: ChannelAccumulator,
}

impl WindowAccumulator {
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn push(&mut self, sample: &Sample) -> Result<(), KpiError> {
        if let Some((channel, value)) = sample.first_non_finite() {
            return Err(KpiError::DataIntegrity {
                ts: sample.ts,
                channel,
                value,
            });
        }

        let dt_hours = match self.last_ts {
            None => None,
            Some(previous) if sample.ts < previous => {
                return Err(KpiError::OutOfOrder {
                    ts: sample.ts,
                    previous,
                });
            }
            Some(previous) => Some(hours_between(previous, sample.ts)),
        };

        self.battery.observe(sample.battery_power, dt_hours);
        self.pv.observe(sample.pv_power, dt_hours);
        self.fuel_cell.observe(sample.fuel_cell_power, dt_hours);
        self.grid_exchange.observe(sample.grid_exchange_power, dt_hours);
        self.voltage.observe(sample.bus_voltage, dt_hours);
        self.frequency.observe(sample.bus_frequency, dt_hours);

        let combined = sample.battery_power.unwrap_or(0.0)
            + sample.pv_power.unwrap_or(0.0)
            + sample.fuel_cell_power.unwrap_or(0.0);
        self.combined_production.observe(Some(combined), dt_hours);

        self.first_ts.get_or_insert(sample.ts);
        self.last_ts = Some(sample.ts);
        self.count += 1;
        Ok(())
    }

    /// Interval attributed to the first sample. The mean of the remaining
    /// deltas telescopes to the window span over `count - 1`.
    fn head_dt_hours(&self) -> f64 {
        match (self.first_ts, self.last_ts) {
            (Some(first), Some(last)) if self.count > 1 => {
                hours_between(first, last) / (self.count - 1) as f64
            }
            _ => SINGLE_SAMPLE_DT_HOURS,
        }
    }

    pub fn finish(self) -> Result<Option<KpiRecord>, KpiError> {
        if self.count == 0 {
            return Ok(None);
        }

        let head_dt = self.head_dt_hours();

        let battery = self.battery.energy_kwh(head_dt);
        let pv = self.pv.energy_kwh(head_dt);
        let fuel_cell = self.fuel_cell.energy_kwh(head_dt);
        let production = battery + pv + fuel_cell;
        let consumption = self.grid_exchange.energy_kwh(head_dt);

        let autonomy = if consumption != 0.0 {
            production / consumption * 100.0
        } else {
            0.0
        };
        let renewable = if production != 0.0 {
            (battery + pv) / production * 100.0
        } else {
            0.0
        };

        let raw = KpiRecord {
            total_consumption_kwh: consumption,
            total_production_kwh: production,
            autonomy_pct: autonomy,
            losses_kwh: (consumption - production).max(0.0),
            peak_consumption_kw: self.grid_exchange.peak_or_zero(),
            peak_production_kw: self.combined_production.peak_or_zero(),
            battery_production_kwh: battery,
            pv_production_kwh: pv,
            fuel_cell_production_kwh: fuel_cell,
            renewable_ratio_pct: renewable,
            mean_voltage: self.voltage.mean_or_zero(),
            mean_frequency: self.frequency.mean_or_zero(),
        };

        if let Some(field) = raw.fields().iter().find(|f| !f.value.is_finite()) {
            return Err(KpiError::NonFiniteResult { metric: field.name });
        }

        Ok(Some(rounded(raw)))
    }
}

fn rounded(r: KpiRecord) -> KpiRecord {
    KpiRecord {
        total_consumption_kwh: round2(r.total_consumption_kwh),
        total_production_kwh: round2(r.total_production_kwh),
        autonomy_pct: round2(r.autonomy_pct),
        losses_kwh: round2(r.losses_kwh),
        peak_consumption_kw: round2(r.peak_consumption_kw),
        peak_production_kw: round2(r.peak_production_kw),
        battery_production_kwh: round2(r.battery_production_kwh),
        pv_production_kwh: round2(r.pv_production_kwh),
        fuel_cell_production_kwh: round2(r.fuel_cell_production_kwh),
        renewable_ratio_pct: round2(r.renewable_ratio_pct),
        mean_voltage: round2(r.mean_voltage),
        mean_frequency: round2(r.mean_frequency),
    }
}

fn hours_between(earlier: OffsetDateTime, later: OffsetDateTime) -> f64 {
    (later - earlier).as_seconds_f64() / 3600.0
}

/// Round to two decimals, ties to even.
fn round2(v: f64) -> f64 {
    let scaled = v * 100.0;
    // magnitudes this large carry no fractional digits
    if !scaled.is_finite() {
        return v + 0.0;
    }
    // adding 0.0 turns -0.0 into 0.0
    scaled.round_ties_even() / 100.0 + 0.0
}
