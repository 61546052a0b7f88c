use crate::api::units::{DataRate, TimeDelta};

/// Byte budget of a fixed-interval pacer.
///
/// Each tick grants `rate * interval` bytes on top of what was left over.
/// The fraction of a byte that does not fit is kept and granted later, so the
/// total granted over any number of ticks is exact. Overspend is carried as a
/// negative balance and repaid by the following ticks.
pub struct PacingBudget {
    interval: TimeDelta,
    bytes_remaining: i64,
    // Sub-byte remainder in bit-microseconds.
    remainder: i128,
}

impl PacingBudget {
    const BIT_MICROS_PER_BYTE: i128 = 8 * 1_000_000;

    pub fn new(interval: TimeDelta) -> Self {
        Self {
            interval,
            bytes_remaining: 0,
            remainder: 0,
        }
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Grants one interval worth of bytes at `target_rate`.
    pub fn increase_budget(&mut self, target_rate: DataRate) {
        let rate_bps = target_rate.bps_or(i64::MAX) as i128;
        let interval_us = self.interval.us_or(0) as i128;
        let total = rate_bps * interval_us + self.remainder;
        let bytes = total / Self::BIT_MICROS_PER_BYTE;
        self.remainder = total % Self::BIT_MICROS_PER_BYTE;
        let bytes = i64::try_from(bytes).unwrap_or(i64::MAX);
        self.bytes_remaining = self.bytes_remaining.saturating_add(bytes);
    }

    pub fn use_budget(&mut self, bytes: usize) {
        let bytes = i64::try_from(bytes).unwrap_or(i64::MAX);
        self.bytes_remaining = self.bytes_remaining.saturating_sub(bytes);
    }

    /// Unused budget is not banked across idle periods.
    pub fn drop_underuse(&mut self) {
        self.bytes_remaining = std::cmp::min(self.bytes_remaining, 0);
    }

    pub fn bytes_remaining(&self) -> i64 {
        self.bytes_remaining
    }

    pub fn has_budget(&self) -> bool {
        self.bytes_remaining > 0
    }
}
