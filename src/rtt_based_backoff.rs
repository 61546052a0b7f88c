/*
 *  Copyright (c) 2012 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use crate::{
    api::units::{DataRate, TimeDelta, Timestamp},
    config::RttBasedBackoffConfig,
};

/// Tracks the propagation RTT and how long the sender has been transmitting
/// without hearing back, so a stalled feedback path reads as a growing RTT.
pub struct RttBasedBackoff {
    pub disabled: bool,
    pub configured_limit: TimeDelta,
    pub drop_fraction: f64,
    pub drop_interval: TimeDelta,
    pub bandwidth_floor: DataRate,
    pub rtt_limit: TimeDelta,
    last_propagation_rtt_update: Timestamp,
    last_propagation_rtt: TimeDelta,
    last_packet_sent: Timestamp,
}

impl RttBasedBackoff {
    pub fn new(config: &RttBasedBackoffConfig) -> Self {
        Self {
            disabled: config.disabled,
            configured_limit: config.configured_limit,
            drop_fraction: config.drop_fraction,
            drop_interval: config.drop_interval,
            bandwidth_floor: config.bandwidth_floor,
            rtt_limit: if config.disabled {
                TimeDelta::plus_infinity()
            } else {
                config.configured_limit
            },
            last_propagation_rtt_update: Timestamp::minus_infinity(),
            last_propagation_rtt: TimeDelta::zero(),
            last_packet_sent: Timestamp::minus_infinity(),
        }
    }

    pub fn reset(&mut self) {
        self.last_propagation_rtt_update = Timestamp::minus_infinity();
        self.last_propagation_rtt = TimeDelta::zero();
        self.last_packet_sent = Timestamp::minus_infinity();
    }

    pub fn update_propagation_rtt(&mut self, at_time: Timestamp, propagation_rtt: TimeDelta) {
        self.last_propagation_rtt_update = at_time;
        self.last_propagation_rtt = propagation_rtt;
    }

    pub fn on_packet_sent(&mut self, send_time: Timestamp) {
        self.last_packet_sent = send_time;
    }

    pub fn last_packet_sent(&self) -> Timestamp {
        self.last_packet_sent
    }

    pub fn is_rtt_above_limit(&self, at_time: Timestamp) -> bool {
        !self.disabled && self.corrected_rtt(at_time) > self.rtt_limit
    }

    /// Rate the target is held at after a drop.
    pub fn backoff_ceiling(&self) -> DataRate {
        self.bandwidth_floor * self.drop_fraction
    }

    pub fn corrected_rtt(&self, at_time: Timestamp) -> TimeDelta {
        if self.last_propagation_rtt_update.is_infinite() || self.last_packet_sent.is_infinite() {
            return self.last_propagation_rtt;
        }
        // Only silence while packets are still going out counts; an idle
        // sender expects no feedback.
        let silence_end = std::cmp::min(at_time, self.last_packet_sent);
        let timeout_correction: TimeDelta = silence_end - self.last_propagation_rtt_update;
        std::cmp::max(self.last_propagation_rtt, timeout_correction)
    }
}
