use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One telemetry reading from the microgrid bus.
///
/// Power channels are in kW and signed: positive means power delivered into
/// the bus. Any channel may be missing for a given reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sample {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub battery_power: Option<f64>,
    pub pv_power: Option<f64>,
    pub fuel_cell_power: Option<f64>,
    pub grid_exchange_power: Option<f64>,
    pub bus_voltage: Option<f64>,
    pub bus_frequency: Option<f64>,
}

/// Named measurement channel of a [`Sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Battery,
    Pv,
    FuelCell,
    GridExchange,
    BusVoltage,
    BusFrequency,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Battery,
        Channel::Pv,
        Channel::FuelCell,
        Channel::GridExchange,
        Channel::BusVoltage,
        Channel::BusFrequency,
    ];

    /// Column / field name used in storage.
    pub fn column(self) -> &'static str {
        match self {
            Channel::Battery => "battery_power",
            Channel::Pv => "pv_power",
            Channel::FuelCell => "fuel_cell_power",
            Channel::GridExchange => "grid_exchange_power",
            Channel::BusVoltage => "bus_voltage",
            Channel::BusFrequency => "bus_frequency",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl Sample {
    /// A reading at `ts` with every channel missing.
    pub fn new(ts: OffsetDateTime) -> Self {
        Self {
            ts,
            battery_power: None,
            pv_power: None,
            fuel_cell_power: None,
            grid_exchange_power: None,
            bus_voltage: None,
            bus_frequency: None,
        }
    }

    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        *self.slot_mut(channel) = Some(value);
        self
    }

    pub fn reading(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::Battery => self.battery_power,
            Channel::Pv => self.pv_power,
            Channel::FuelCell => self.fuel_cell_power,
            Channel::GridExchange => self.grid_exchange_power,
            Channel::BusVoltage => self.bus_voltage,
            Channel::BusFrequency => self.bus_frequency,
        }
    }

    pub fn slot_mut(&mut self, channel: Channel) -> &mut Option<f64> {
        match channel {
            Channel::Battery => &mut self.battery_power,
            Channel::Pv => &mut self.pv_power,
            Channel::FuelCell => &mut self.fuel_cell_power,
            Channel::GridExchange => &mut self.grid_exchange_power,
            Channel::BusVoltage => &mut self.bus_voltage,
            Channel::BusFrequency => &mut self.bus_frequency,
        }
    }

    /// First channel holding a NaN or infinite value, if any.
    pub fn first_non_finite(&self) -> Option<(Channel, f64)> {
        Channel::ALL.into_iter().find_map(|channel| match self.reading(channel) {
            Some(v) if !v.is_finite() => Some((channel, v)),
            _ => None,
        })
    }
}
