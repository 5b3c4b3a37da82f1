/// Single-pass reducer for one nullable channel.
///
/// Missing readings integrate as zero energy, do not count towards the mean
/// and never become the peak. The first sample's interval is only known once
/// the window is complete, so its reading is held in `head` until
/// [`ChannelAccumulator::energy_kwh`] is called.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelAccumulator {
    head: f64,
    tail_energy: f64,
    sum: f64,
    count: u64,
    peak: Option<f64>,
}

impl ChannelAccumulator {
    /// Record one reading. `dt_hours` is `None` for the first sample of the
    /// window and the elapsed time since the previous sample otherwise.
    pub fn observe(&mut self, reading: Option<f64>, dt_hours: Option<f64>) {
        let filled = reading.unwrap_or(0.0);
        match dt_hours {
            None => self.head = filled,
            Some(dt) => self.tail_energy += filled * dt,
        }

        if let Some(v) = reading {
            self.sum += v;
            self.count += 1;
            self.peak = Some(self.peak.map_or(v, |p| p.max(v)));
        }
    }

    /// Integrated energy, given the interval attributed to the first sample.
    pub fn energy_kwh(&self, head_dt_hours: f64) -> f64 {
        self.head * head_dt_hours + self.tail_energy
    }

    pub fn mean_or_zero(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn peak_or_zero(&self) -> f64 {
        self.peak.unwrap_or(0.0)
    }
}
