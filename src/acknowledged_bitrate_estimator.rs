/*
 *  Copyright (c) 2017 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 */

use crate::{
    api::{
        transport::PacketResult,
        units::{DataRate, Timestamp},
    },
    bitrate_estimator::BitrateEstimator,
};

/// Throughput the receiver acknowledged, fed by per-packet transport feedback.
#[derive(Default)]
pub struct AcknowledgedBitrateEstimator {
    bitrate_estimator: BitrateEstimator,
    last_receive_time: Option<Timestamp>,
}

impl AcknowledgedBitrateEstimator {
    /// `packet_feedback` must be sorted by receive time and contain received
    /// packets only.
    pub fn incoming_packet_feedback(&mut self, packet_feedback: &[PacketResult]) {
        debug_assert!(packet_feedback.windows(2).all(|w| w[0].receive_time <= w[1].receive_time));

        // Anything at or before the previous batch was already counted, or
        // would reset the window when reordered.
        let counted_until = self.last_receive_time;
        for packet in packet_feedback {
            if counted_until.is_some_and(|last| packet.receive_time <= last) {
                continue;
            }
            self.last_receive_time = Some(packet.receive_time);
            self.bitrate_estimator
                .update(packet.receive_time, packet.sent_packet.size);
        }
    }

    pub fn bitrate(&self) -> Option<DataRate> {
        self.bitrate_estimator.bitrate()
    }

    /// Lets the estimate move quickly after the sender changed its rate on
    /// purpose.
    pub fn expect_fast_rate_change(&mut self) {
        self.bitrate_estimator.expect_fast_rate_change();
    }
}
