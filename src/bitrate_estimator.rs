/*
 *  Copyright (c) 2017 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use crate::api::units::{DataRate, DataSize, TimeDelta, Timestamp};

// Computes a bayesian estimate of the throughput given acks containing
// the arrival time and payload size. Samples which are far from the current
// estimate or are based on few packets are given a smaller weight, as they
// are considered to be more likely to have been caused by, e.g., delay spikes
// unrelated to congestion.
#[derive(Clone)]
pub struct BitrateEstimator {
    sum: DataSize,
    initial_window: TimeDelta,
    noninitial_window: TimeDelta,
    uncertainty_scale: f64,
    small_sample_uncertainty_scale: f64,
    small_sample_threshold: DataSize,
    uncertainty_symmetry_cap: DataRate,
    estimate_floor: DataRate,
    current_window: TimeDelta,
    prev_time: Option<Timestamp>,
    bitrate_estimate_kbps: Option<f64>,
    bitrate_estimate_var: f64,
}

impl Default for BitrateEstimator {
    fn default() -> Self {
        Self {
            sum: DataSize::zero(),
            initial_window: Self::INITIAL_RATE_WINDOW,
            noninitial_window: Self::RATE_WINDOW,
            uncertainty_scale: 10.0,
            small_sample_uncertainty_scale: 10.0,
            small_sample_threshold: DataSize::zero(),
            uncertainty_symmetry_cap: DataRate::zero(),
            estimate_floor: DataRate::zero(),
            current_window: TimeDelta::zero(),
            prev_time: None,
            bitrate_estimate_kbps: None,
            bitrate_estimate_var: 50.0,
        }
    }
}

impl BitrateEstimator {
    const INITIAL_RATE_WINDOW: TimeDelta = TimeDelta::from_millis(500);
    const RATE_WINDOW: TimeDelta = TimeDelta::from_millis(150);

    pub fn update(&mut self, at_time: Timestamp, amount: DataSize) {
        // We use a larger window at the beginning to get a more stable sample that
        // we can use to initialize the estimate.
        let rate_window = match self.bitrate_estimate_kbps {
            Some(_) => self.noninitial_window,
            None => self.initial_window,
        };
        let (bitrate_sample_kbps, is_small_sample) = match self.update_window(at_time, amount, rate_window) {
            Some(sample) => sample,
            None => return,
        };
        let estimate_kbps = match self.bitrate_estimate_kbps {
            Some(estimate) => estimate,
            None => {
                // This is the very first sample we get. Use it to initialize the estimate.
                self.bitrate_estimate_kbps = Some(bitrate_sample_kbps);
                return;
            }
        };

        // Optionally use higher uncertainty for very small samples to avoid dropping
        // estimate.
        let scale = if is_small_sample && bitrate_sample_kbps < estimate_kbps {
            self.small_sample_uncertainty_scale
        } else {
            self.uncertainty_scale
        };
        // Define the sample uncertainty as a function of how far away it is from the
        // current estimate. With low values of uncertainty_symmetry_cap we add more
        // uncertainty to increases than to decreases. For higher values we approach
        // symmetry.
        let sample_uncertainty: f64 = scale * (estimate_kbps - bitrate_sample_kbps).abs()
            / (estimate_kbps + bitrate_sample_kbps.max(self.uncertainty_symmetry_cap.kbps_float()));

        let sample_var: f64 = sample_uncertainty * sample_uncertainty;
        // Update a bayesian estimate of the rate, weighting it lower if the sample
        // uncertainty is large.
        // The bitrate estimate uncertainty is increased with each update to model
        // that the bitrate changes over time.
        let pred_bitrate_estimate_var: f64 = self.bitrate_estimate_var + 5.0;
        let updated_kbps = (sample_var * estimate_kbps
            + pred_bitrate_estimate_var * bitrate_sample_kbps)
            / (sample_var + pred_bitrate_estimate_var);
        self.bitrate_estimate_kbps = Some(updated_kbps.max(self.estimate_floor.kbps_float()));
        self.bitrate_estimate_var =
            sample_var * pred_bitrate_estimate_var / (sample_var + pred_bitrate_estimate_var);
    }

    pub fn bitrate(&self) -> Option<DataRate> {
        self.bitrate_estimate_kbps
            .map(DataRate::from_kilobits_per_sec_float)
    }

    pub fn expect_fast_rate_change(&mut self) {
        // By setting the bitrate-estimate variance to a higher value we allow the
        // bitrate to change fast for the next few samples.
        self.bitrate_estimate_var += 200.0;
    }

    // Returns the rate sample in kbps and whether it was a small one, once a
    // full window has been collected.
    fn update_window(
        &mut self,
        at_time: Timestamp,
        amount: DataSize,
        rate_window: TimeDelta,
    ) -> Option<(f64, bool)> {
        if let Some(prev_time) = self.prev_time {
            if at_time < prev_time {
                // Reset if time moves backwards.
                self.sum = DataSize::zero();
                self.current_window = TimeDelta::zero();
            } else {
                let elapsed = at_time - prev_time;
                self.current_window += elapsed;
                // Reset if nothing has been received for more than a full window.
                if elapsed > rate_window {
                    self.sum = DataSize::zero();
                    self.current_window = TimeDelta::from_micros(self.current_window.us() % rate_window.us());
                }
            }
        }
        self.prev_time = Some(at_time);

        let mut sample = None;
        if self.current_window >= rate_window {
            let is_small_sample = self.sum < self.small_sample_threshold;
            let bitrate_sample_kbps = 8.0 * self.sum.bytes_float() / rate_window.ms_float();
            sample = Some((bitrate_sample_kbps, is_small_sample));
            self.current_window -= rate_window;
            self.sum = DataSize::zero();
        }
        self.sum += amount;
        sample
    }
}
