/*
 *  Copyright (c) 2012 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use crate::api::units::{DataRate, TimeDelta, Timestamp};

/// One-sided moving average of the physical link capacity, used as a soft
/// ceiling for the target rate.
pub struct LinkCapacityTracker {
    capacity_estimate_bps: f64,
    // False until a delay-based, acknowledged or backoff sample arrived; the
    // starting rate alone does not establish a ceiling.
    measured: bool,
    tracking_rate: TimeDelta,
    last_link_capacity_update: Timestamp,
    last_delay_based_estimate: DataRate,
}

impl Default for LinkCapacityTracker {
    fn default() -> Self {
        Self {
            capacity_estimate_bps: 0.0,
            measured: false,
            tracking_rate: Self::INITIAL_TRACKING_RATE,
            last_link_capacity_update: Timestamp::minus_infinity(),
            last_delay_based_estimate: DataRate::plus_infinity(),
        }
    }
}

impl LinkCapacityTracker {
    const INITIAL_TRACKING_RATE: TimeDelta = TimeDelta::from_seconds(1);
    const TRACKING_RATE_STEP: TimeDelta = TimeDelta::from_seconds(1);
    const MAX_TRACKING_RATE: TimeDelta = TimeDelta::from_seconds(10);
    const ACKNOWLEDGED_TRACKING_RATE: TimeDelta = TimeDelta::from_seconds(10);
    // Delay-based samples below this share of the estimate are dips, not
    // capacity changes.
    const REGRESSION_MARGIN: f64 = 0.5;

    // Call when a new delay-based estimate is available.
    pub fn update_delay_based_estimate(
        &mut self,
        at_time: Timestamp,
        delay_based_bitrate: DataRate,
    ) {
        if delay_based_bitrate.is_zero() || delay_based_bitrate.is_infinite() {
            return;
        }

        let sample = delay_based_bitrate.bps_float();
        if !self.measured {
            self.capacity_estimate_bps = sample;
            self.measured = true;
        } else if sample >= self.capacity_estimate_bps * Self::REGRESSION_MARGIN {
            let alpha = self.smoothing_factor(at_time, self.tracking_rate);
            self.capacity_estimate_bps =
                alpha * self.capacity_estimate_bps + (1.0 - alpha) * sample;
            self.tracking_rate = std::cmp::min(
                self.tracking_rate + Self::TRACKING_RATE_STEP,
                Self::MAX_TRACKING_RATE,
            );
        }

        self.last_link_capacity_update = at_time;
        self.last_delay_based_estimate = delay_based_bitrate;
    }

    pub fn on_starting_rate(&mut self, start_rate: DataRate) {
        if !self.measured {
            self.capacity_estimate_bps = start_rate.bps_float();
        }
    }

    pub fn on_rate_update(
        &mut self,
        acknowledged: Option<DataRate>,
        target: DataRate,
        at_time: Timestamp,
    ) {
        let acknowledged = match acknowledged {
            Some(ack) => ack,
            None => return,
        };
        let acknowledged_target: DataRate = std::cmp::min(acknowledged, target);
        if acknowledged_target.bps_float() > self.capacity_estimate_bps {
            let alpha = self.smoothing_factor(at_time, Self::ACKNOWLEDGED_TRACKING_RATE);
            self.capacity_estimate_bps = alpha * self.capacity_estimate_bps
                + (1.0 - alpha) * acknowledged_target.bps_float();
        }
        self.measured = true;
        self.last_link_capacity_update = at_time;
    }

    pub fn on_rtt_backoff(&mut self, backoff_rate: DataRate, at_time: Timestamp) {
        self.capacity_estimate_bps = self.capacity_estimate_bps.min(backoff_rate.bps_float());
        self.measured = true;
        self.last_link_capacity_update = at_time;
    }

    pub fn estimate(&self) -> DataRate {
        if !self.measured {
            return DataRate::plus_infinity();
        }
        DataRate::from_bits_per_sec_float(self.capacity_estimate_bps)
    }

    pub fn last_delay_based_estimate(&self) -> DataRate {
        self.last_delay_based_estimate
    }

    fn smoothing_factor(&self, at_time: Timestamp, tracking_rate: TimeDelta) -> f64 {
        let delta: TimeDelta = at_time - self.last_link_capacity_update;
        if delta.is_finite() {
            (-(delta / tracking_rate)).exp()
        } else {
            0.0
        }
    }
}
