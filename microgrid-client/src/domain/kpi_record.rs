use std::fmt;

use serde::{Deserialize, Serialize};

/// Display unit attached to each KPI field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KpiUnit {
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "kWh")]
    KilowattHour,
    #[serde(rename = "kW")]
    Kilowatt,
    #[serde(rename = "V")]
    Volt,
    #[serde(rename = "Hz")]
    Hertz,
}

impl KpiUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            KpiUnit::Percent => "%",
            KpiUnit::KilowattHour => "kWh",
            KpiUnit::Kilowatt => "kW",
            KpiUnit::Volt => "V",
            KpiUnit::Hertz => "Hz",
        }
    }
}

/// A single named KPI value together with its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KpiField {
    pub name: &'static str,
    pub value: f64,
    pub unit: KpiUnit,
}

/// Fixed-shape KPI output for one sample window.
///
/// Values are rounded to two decimals and always finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiRecord {
    pub total_consumption_kwh: f64,
    pub total_production_kwh: f64,
    pub autonomy_pct: f64,
    pub losses_kwh: f64,
    pub peak_consumption_kw: f64,
    pub peak_production_kw: f64,
    pub battery_production_kwh: f64,
    pub pv_production_kwh: f64,
    pub fuel_cell_production_kwh: f64,
    pub renewable_ratio_pct: f64,
    pub mean_voltage: f64,
    pub mean_frequency: f64,
}

impl KpiRecord {
    pub const FIELD_COUNT: usize = 12;

    /// All fields in their canonical report order.
    pub fn fields(&self) -> [KpiField; Self::FIELD_COUNT] {
        use KpiUnit::*;

        let f = |name, value, unit| KpiField { name, value, unit };
        [
            f("total_consumption_kwh", self.total_consumption_kwh, KilowattHour),
            f("total_production_kwh", self.total_production_kwh, KilowattHour),
            f("autonomy_pct", self.autonomy_pct, Percent),
            f("losses_kwh", self.losses_kwh, KilowattHour),
            f("peak_consumption_kw", self.peak_consumption_kw, Kilowatt),
            f("peak_production_kw", self.peak_production_kw, Kilowatt),
            f("battery_production_kwh", self.battery_production_kwh, KilowattHour),
            f("pv_production_kwh", self.pv_production_kwh, KilowattHour),
            f("fuel_cell_production_kwh", self.fuel_cell_production_kwh, KilowattHour),
            f("renewable_ratio_pct", self.renewable_ratio_pct, Percent),
            f("mean_voltage", self.mean_voltage, Volt),
            f("mean_frequency", self.mean_frequency, Hertz),
        ]
    }
}

impl fmt::Display for KpiRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Microgrid KPIs ---")?;
        for (i, field) in self.fields().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:<26}{:>12.2} {}", field.name, field.value, field.unit.symbol())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> KpiRecord {
        KpiRecord {
            total_consumption_kwh: 16.0,
            total_production_kwh: 20.0,
            autonomy_pct: 125.0,
            losses_kwh: 0.0,
            peak_consumption_kw: 8.0,
            peak_production_kw: 10.0,
            battery_production_kwh: 0.0,
            pv_production_kwh: 20.0,
            fuel_cell_production_kwh: 0.0,
            renewable_ratio_pct: 100.0,
            mean_voltage: 400.12,
            mean_frequency: 50.01,
        }
    }

    #[test]
    fn fields_are_tagged_by_suffix() {
        for field in record().fields() {
            let expected = if field.name.ends_with("_pct") {
                KpiUnit::Percent
            } else if field.name.ends_with("_kwh") {
                KpiUnit::KilowattHour
            } else if field.name.ends_with("_kw") {
                KpiUnit::Kilowatt
            } else if field.name == "mean_voltage" {
                KpiUnit::Volt
            } else {
                KpiUnit::Hertz
            };
            assert_eq!(field.unit, expected, "{}", field.name);
        }
    }

    #[test]
    fn display_lists_every_field() {
        let text = record().to_string();
        for field in record().fields() {
            assert!(text.contains(field.name));
        }
        assert!(text.contains("125.00 %"));
    }
}
