/*
 *  Copyright (c) 2012 The WebRTC project authors. All Rights Reserved.
 *
 *  Use of this source code is governed by a BSD-style license
 *  that can be found in the LICENSE file in the root of the source
 *  tree. An additional intellectual property rights grant can be found
 *  in the file PATENTS.  All contributing project authors may
 *  be found in the AUTHORS file in the root of the source tree.
 *
 *  FEC and NACK added bitrate is handled outside class
 */

use std::collections::{BTreeSet, VecDeque};

use crate::{
    api::{
        transport::{SentPacket, TransportPacketsFeedback},
        units::{DataRate, TimeDelta, Timestamp},
    },
    config::{Config, CONGESTION_CONTROLLER_MIN_BITRATE, DEFAULT_MAX_BITRATE},
    link_capacity_tracker::LinkCapacityTracker,
    rtt_based_backoff::RttBasedBackoff,
};

/// Which regime the estimator is in.
///
/// `Start` until the first loss report, RTT sample or delay-based estimate.
/// `SteadyState` for normal loss driven updates.
/// `RttBackoff` once the corrected RTT exceeded its limit; left for
/// `SteadyState` after `drop_interval` when the RTT is back under the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorState {
    Start,
    SteadyState,
    RttBackoff {
        last_drop: Timestamp,
        held_rate: DataRate,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportProgress {
    NoUpdate,
    FirstDone,
    Done,
}

/// One-time bookkeeping about how the session started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupStats {
    /// Packets reported lost during the start phase.
    pub initially_lost_packets: i64,
    /// Target once the start phase was over.
    pub bitrate_at_2_seconds: Option<DataRate>,
    /// Time from the first report until each ramp-up threshold was reached.
    pub rampup_times: Vec<(DataRate, TimeDelta)>,
    /// How far the target moved down between the start phase and convergence.
    pub converged_diff: Option<DataRate>,
    pub initial_rtt: Option<TimeDelta>,
}

pub struct LossBasedBweV0 {
    config: Config,
    rtt_backoff: RttBasedBackoff,
    link_capacity: LinkCapacityTracker,
    state: EstimatorState,
    // Set by a loss driven decrease, cleared by the next loss report.
    decreased_since_last_loss_report: bool,

    min_bitrate_history: VecDeque<(Timestamp, DataRate)>,

    // incoming filters
    lost_packets_since_last_loss_update: i64,
    expected_packets_since_last_loss_update: i64,

    acknowledged_rate: Option<DataRate>,
    current_target: DataRate,
    last_logged_target: DataRate,
    min_bitrate_configured: DataRate,
    max_bitrate_configured: DataRate,
    last_low_bitrate_log: Timestamp,

    last_loss_packet_report: Timestamp,
    last_fraction_loss: u8,
    last_logged_fraction_loss: u8,
    last_round_trip_time: TimeDelta,
    last_target_log: Timestamp,

    // The max bitrate as set by the receiver in the call. This is typically
    // signalled using the REMB RTCP message and is used when we don't have any
    // send side delay based estimate.
    receiver_limit: DataRate,
    delay_based_limit: DataRate,
    time_last_decrease: Timestamp,
    first_report_time: Timestamp,
    report_progress: ReportProgress,
    startup_stats: StartupStats,
    low_loss_threshold: f32,
    high_loss_threshold: f32,
    bitrate_threshold: DataRate,

    // Transport feedback accounting.
    highest_sent_sequence_number: Option<i64>,
    accounted_packets: BTreeSet<i64>,
    accounted_floor: i64,
    feedback_lost_packets: i64,
    feedback_expected_packets: i64,
    next_loss_update: Timestamp,
}

impl LossBasedBweV0 {
    const BWE_INCREASE_INTERVAL: TimeDelta = TimeDelta::from_millis(1000);
    const BWE_DECREASE_INTERVAL: TimeDelta = TimeDelta::from_millis(300);
    const START_PHASE: TimeDelta = TimeDelta::from_millis(2000);
    const BWE_CONVERGENCE_TIME: TimeDelta = TimeDelta::from_millis(20000);
    const LIMIT_NUM_PACKETS: i64 = 20;
    const LOW_BITRATE_LOG_PERIOD: TimeDelta = TimeDelta::from_millis(10000);
    const TARGET_LOG_PERIOD: TimeDelta = TimeDelta::from_millis(5000);
    // Expecting that RTCP feedback is sent uniformly within [0.5, 1.5]s intervals.
    const MAX_RTCP_FEEDBACK_INTERVAL: TimeDelta = TimeDelta::from_millis(5000);
    const LOSS_UPDATE_INTERVAL: TimeDelta = TimeDelta::from_millis(1000);
    // Sequence numbers further behind the newest accounted one are stale.
    const FEEDBACK_WINDOW_PACKETS: i64 = 1 << 14;
    const RAMPUP_THRESHOLDS: [DataRate; 3] = [
        DataRate::from_kilobits_per_sec(500),
        DataRate::from_kilobits_per_sec(1000),
        DataRate::from_kilobits_per_sec(2000),
    ];

    pub fn new(config: &Config) -> Self {
        let thresholds = config.loss_thresholds;
        tracing::info!(
            "Loss thresholds {:?}, {:?}, bitrate threshold {:?}",
            thresholds.low_loss_threshold,
            thresholds.high_loss_threshold,
            thresholds.bitrate_threshold
        );

        let mut bwe = Self {
            config: config.clone(),
            rtt_backoff: RttBasedBackoff::new(&config.max_rtt_limit),
            link_capacity: LinkCapacityTracker::default(),
            state: EstimatorState::Start,
            decreased_since_last_loss_report: false,
            min_bitrate_history: VecDeque::new(),
            lost_packets_since_last_loss_update: 0,
            expected_packets_since_last_loss_update: 0,
            acknowledged_rate: None,
            current_target: DataRate::zero(),
            last_logged_target: DataRate::zero(),
            min_bitrate_configured: CONGESTION_CONTROLLER_MIN_BITRATE,
            max_bitrate_configured: DEFAULT_MAX_BITRATE,
            last_low_bitrate_log: Timestamp::minus_infinity(),
            last_loss_packet_report: Timestamp::minus_infinity(),
            last_fraction_loss: 0,
            last_logged_fraction_loss: 0,
            last_round_trip_time: TimeDelta::zero(),
            last_target_log: Timestamp::minus_infinity(),
            receiver_limit: DataRate::plus_infinity(),
            delay_based_limit: DataRate::plus_infinity(),
            time_last_decrease: Timestamp::minus_infinity(),
            first_report_time: Timestamp::minus_infinity(),
            report_progress: ReportProgress::NoUpdate,
            startup_stats: StartupStats::default(),
            low_loss_threshold: thresholds.low_loss_threshold,
            high_loss_threshold: thresholds.high_loss_threshold,
            bitrate_threshold: thresholds.bitrate_threshold,
            highest_sent_sequence_number: None,
            accounted_packets: BTreeSet::new(),
            accounted_floor: i64::MIN,
            feedback_lost_packets: 0,
            feedback_expected_packets: 0,
            next_loss_update: Timestamp::minus_infinity(),
        };

        bwe.set_min_max_bitrate(config.bitrates.min, config.bitrates.max);
        let start = config.bitrates.start;
        bwe.link_capacity.on_starting_rate(start);
        bwe.current_target = start.clamped(bwe.min_bitrate_configured, bwe.max_bitrate_configured);
        bwe.last_logged_target = bwe.current_target;
        bwe
    }

    /// Forgets everything learned about the path, keeping the configuration.
    pub fn reset(&mut self) {
        let config = self.config.clone();
        *self = Self::new(&config);
    }

    pub fn target_rate(&self) -> DataRate {
        self.current_target
    }

    pub fn state(&self) -> EstimatorState {
        self.state
    }

    pub fn startup_stats(&self) -> &StartupStats {
        &self.startup_stats
    }

    // Return whether the current rtt is higher than the rtt limited configured in
    // RttBasedBackoff.
    pub fn is_rtt_above_limit(&self, at_time: Timestamp) -> bool {
        self.rtt_backoff.is_rtt_above_limit(at_time)
    }

    pub fn fraction_loss(&self) -> u8 {
        self.last_fraction_loss
    }

    pub fn round_trip_time(&self) -> TimeDelta {
        self.last_round_trip_time
    }

    pub fn get_estimated_link_capacity(&self) -> DataRate {
        self.link_capacity.estimate()
    }

    // Call periodically to update estimate.
    pub fn update_estimate(&mut self, at_time: Timestamp) {
        let candidate = self.loss_based_candidate(at_time);
        let new_bitrate = self.apply_rtt_backoff(candidate, at_time);
        self.update_target_bitrate(new_bitrate, at_time);
    }

    pub fn on_sent_packet(&mut self, sent_packet: &SentPacket) {
        if self.highest_sent_sequence_number.is_none() {
            // Silence is measured from the first packet until an RTT sample
            // arrives.
            self.rtt_backoff
                .update_propagation_rtt(sent_packet.send_time, TimeDelta::zero());
        }
        self.rtt_backoff.on_packet_sent(sent_packet.send_time);
        self.highest_sent_sequence_number = Some(
            self.highest_sent_sequence_number
                .map_or(sent_packet.sequence_number, |highest| {
                    highest.max(sent_packet.sequence_number)
                }),
        );
    }

    pub fn update_propagation_rtt(&mut self, at_time: Timestamp, propagation_rtt: TimeDelta) {
        self.leave_start_phase();
        self.rtt_backoff
            .update_propagation_rtt(at_time, propagation_rtt);
    }

    // Call when we receive a RTCP message with TMMBR or REMB.
    pub fn update_receiver_estimate(&mut self, at_time: Timestamp, bandwidth: DataRate) {
        self.receiver_limit = if bandwidth.is_zero() {
            DataRate::plus_infinity()
        } else {
            bandwidth
        };
        self.apply_target_limits(at_time);
    }

    // Call when a new delay-based estimate is available.
    pub fn update_delay_based_estimate(&mut self, at_time: Timestamp, bitrate: DataRate) {
        self.leave_start_phase();
        self.link_capacity
            .update_delay_based_estimate(at_time, bitrate);
        self.delay_based_limit = if bitrate.is_zero() {
            DataRate::plus_infinity()
        } else {
            bitrate
        };
        self.apply_target_limits(at_time);
    }

    // Call when we receive a RTCP message with a ReceiveBlock.
    pub fn update_packets_lost(
        &mut self,
        packets_lost: i64,
        number_of_packets: i64,
        at_time: Timestamp,
    ) {
        if number_of_packets <= 0 {
            tracing::trace!("ignoring loss report without packets");
            return;
        }

        if self.first_report_time.is_infinite() {
            self.first_report_time = at_time;
        }
        self.leave_start_phase();

        let expected: i64 = self.expected_packets_since_last_loss_update + number_of_packets;

        // Don't generate a loss rate until it can be based on enough packets.
        if expected < Self::LIMIT_NUM_PACKETS {
            // Accumulate reports.
            self.expected_packets_since_last_loss_update = expected;
            self.lost_packets_since_last_loss_update += packets_lost;
            return;
        }

        self.decreased_since_last_loss_report = false;

        let lost_q8: i64 =
            std::cmp::max(self.lost_packets_since_last_loss_update + packets_lost, 0) << 8;
        self.last_fraction_loss = (lost_q8 / expected).min(255) as u8;

        // Reset accumulators.
        self.lost_packets_since_last_loss_update = 0;
        self.expected_packets_since_last_loss_update = 0;
        self.last_loss_packet_report = at_time;
        self.update_estimate(at_time);

        self.update_startup_stats(at_time, packets_lost);
    }

    // Call when we receive a RTCP message with a ReceiveBlock.
    pub fn update_rtt(&mut self, rtt: TimeDelta, at_time: Timestamp) {
        // Update RTT if we were able to compute an RTT based on this RTCP.
        // FlexFEC doesn't send RTCP SR, which means we won't be able to compute RTT.
        if rtt > TimeDelta::zero() && rtt.is_finite() {
            self.leave_start_phase();
            self.last_round_trip_time = rtt;
            self.rtt_backoff.update_propagation_rtt(at_time, rtt);
            if self.startup_stats.initial_rtt.is_none() {
                tracing::info!("initial rtt {:?}", rtt);
                self.startup_stats.initial_rtt = Some(rtt);
            }
        }
    }

    pub fn set_bitrates(
        &mut self,
        send_bitrate: Option<DataRate>,
        min_bitrate: DataRate,
        max_bitrate: DataRate,
        at_time: Timestamp,
    ) {
        self.set_min_max_bitrate(min_bitrate, max_bitrate);
        if let Some(send_bitrate) = send_bitrate {
            self.link_capacity.on_starting_rate(send_bitrate);
            self.set_send_bitrate(send_bitrate, at_time);
        }
    }

    pub fn set_send_bitrate(&mut self, bitrate: DataRate, at_time: Timestamp) {
        if bitrate.is_zero() || bitrate.is_infinite() {
            tracing::warn!("ignoring send bitrate {:?}", bitrate);
            return;
        }
        // Reset to avoid being capped by the estimate.
        self.delay_based_limit = DataRate::plus_infinity();
        self.update_target_bitrate(bitrate, at_time);
        // Clear last sent bitrate history so the new value can be used directly
        // and not capped.
        self.min_bitrate_history.clear();
    }

    pub fn set_min_max_bitrate(&mut self, min_bitrate: DataRate, max_bitrate: DataRate) {
        self.max_bitrate_configured = if max_bitrate > DataRate::zero() && max_bitrate.is_finite() {
            max_bitrate
        } else {
            DEFAULT_MAX_BITRATE
        };
        self.min_bitrate_configured = std::cmp::max(min_bitrate, CONGESTION_CONTROLLER_MIN_BITRATE);
        if self.min_bitrate_configured > self.max_bitrate_configured {
            tracing::warn!(
                "min bitrate {:?} above max bitrate {:?}, using max",
                self.min_bitrate_configured,
                self.max_bitrate_configured
            );
            self.min_bitrate_configured = self.max_bitrate_configured;
        }
    }

    pub fn get_min_bitrate(&self) -> i64 {
        self.min_bitrate_configured.bps()
    }

    pub fn set_acknowledged_rate(
        &mut self,
        acknowledged_rate: Option<DataRate>,
        _at_time: Timestamp,
    ) {
        self.acknowledged_rate = acknowledged_rate;
    }

    pub fn incoming_packet_feedback_vector(&mut self, report: &TransportPacketsFeedback) {
        if report.feedback_time.is_infinite() {
            return;
        }
        let highest_sent = match self.highest_sent_sequence_number {
            Some(highest) => highest,
            None => {
                tracing::debug!("feedback before any packet was sent");
                return;
            }
        };

        let mut new_packets = Vec::with_capacity(report.packet_feedbacks.len());
        for feedback in &report.packet_feedbacks {
            let sent = &feedback.sent_packet;
            if sent.send_time.is_infinite()
                || sent.sequence_number > highest_sent
                || sent.sequence_number < self.accounted_floor
            {
                continue;
            }
            if !self.accounted_packets.insert(sent.sequence_number) {
                continue;
            }
            new_packets.push(feedback);
        }

        if new_packets.is_empty() {
            return;
        }

        let max_recv_time = new_packets
            .iter()
            .filter(|fb| fb.is_received())
            .map(|fb| fb.receive_time)
            .max()
            .unwrap_or(Timestamp::minus_infinity());
        let mut min_propagation_rtt = TimeDelta::plus_infinity();
        for feedback in new_packets.iter().filter(|fb| fb.is_received()) {
            let feedback_rtt = report.feedback_time - feedback.sent_packet.send_time;
            let min_pending_time = max_recv_time - feedback.receive_time;
            let propagation_rtt = feedback_rtt - min_pending_time;
            min_propagation_rtt = std::cmp::min(min_propagation_rtt, propagation_rtt);
        }
        if min_propagation_rtt.is_finite() {
            self.update_propagation_rtt(report.feedback_time, min_propagation_rtt);
            self.update_rtt(min_propagation_rtt, report.feedback_time);
        }

        self.feedback_expected_packets += new_packets.len() as i64;
        self.feedback_lost_packets += new_packets.iter().filter(|fb| !fb.is_received()).count() as i64;

        if report.feedback_time >= self.next_loss_update {
            let lost = std::mem::take(&mut self.feedback_lost_packets);
            let expected = std::mem::take(&mut self.feedback_expected_packets);
            self.next_loss_update = report.feedback_time + Self::LOSS_UPDATE_INTERVAL;
            self.update_packets_lost(lost, expected, report.feedback_time);
        }

        self.prune_accounted_packets();
    }

    fn prune_accounted_packets(&mut self) {
        let newest = match self.accounted_packets.last() {
            Some(newest) => *newest,
            None => return,
        };
        let floor = newest - Self::FEEDBACK_WINDOW_PACKETS;
        if floor > self.accounted_floor {
            self.accounted_packets = self.accounted_packets.split_off(&floor);
            self.accounted_floor = floor;
        }
    }

    fn leave_start_phase(&mut self) {
        if self.state == EstimatorState::Start {
            self.state = EstimatorState::SteadyState;
        }
    }

    fn loss_based_candidate(&mut self, at_time: Timestamp) -> DataRate {
        // We trust the REMB and/or delay-based estimate during the first 2 seconds if
        // we haven't had any packet loss reported, to allow startup bitrate probing.
        if self.last_fraction_loss == 0 && self.is_in_start_phase(at_time) {
            let mut new_bitrate: DataRate = self.current_target;
            if self.receiver_limit.is_finite() {
                new_bitrate = std::cmp::max(self.receiver_limit, new_bitrate);
            }
            if self.delay_based_limit.is_finite() {
                new_bitrate = std::cmp::max(self.delay_based_limit, new_bitrate);
            }
            if new_bitrate != self.current_target {
                self.min_bitrate_history.clear();
                self.min_bitrate_history
                    .push_back((at_time, self.current_target));
                return new_bitrate;
            }
        }

        self.update_min_history(at_time);
        if self.last_loss_packet_report.is_infinite() {
            // No feedback received.
            return self.current_target;
        }

        let time_since_loss_packet_report: TimeDelta = at_time - self.last_loss_packet_report;
        if time_since_loss_packet_report >= Self::MAX_RTCP_FEEDBACK_INTERVAL * 1.2 {
            return self.current_target;
        }

        // We only care about loss above a given bitrate threshold.
        let loss: f32 = self.last_fraction_loss as f32 / 256.0;
        // We only make decisions based on loss when the bitrate is above a
        // threshold. This is a crude way of handling loss which is uncorrelated
        // to congestion.
        if self.current_target < self.bitrate_threshold || loss <= self.low_loss_threshold {
            // Loss < 2%: Increase rate by 8% of the min bitrate in the last
            // BWE_INCREASE_INTERVAL.
            // Note that by remembering the bitrate over the last second one can
            // rampup up one second faster than if only allowed to start ramping
            // at 8% per second rate now.
            let min_recent = self
                .min_bitrate_history
                .front()
                .map_or(self.current_target, |(_, rate)| *rate);
            let new_bitrate =
                DataRate::from_bits_per_sec_float(min_recent.bps_float() * 1.08 + 0.5);

            // Add 1 kbps extra, just to make sure that we do not get stuck
            // (gives a little extra increase at low rates, negligible at higher
            // rates).
            return new_bitrate + DataRate::from_bits_per_sec(1000);
        }

        if self.current_target > self.bitrate_threshold
            && loss > self.high_loss_threshold
            && !self.decreased_since_last_loss_report
            && (at_time - self.time_last_decrease)
                >= (Self::BWE_DECREASE_INTERVAL + self.last_round_trip_time)
        {
            // Loss > 10%: Limit the rate decreases to once a BWE_DECREASE_INTERVAL
            // + rtt.
            self.time_last_decrease = at_time;
            self.decreased_since_last_loss_report = true;

            // Reduce rate:
            //   newRate = rate * (1 - 0.5*lossRate);
            //   where packetLoss = 256*lossRate;
            return DataRate::from_bits_per_sec_float(
                (self.current_target.bps_float() * (512.0 - self.last_fraction_loss as f64))
                    / 512.0,
            );
        }

        // Loss between 2% - 10%: Do nothing.
        self.current_target
    }

    fn apply_rtt_backoff(&mut self, candidate: DataRate, at_time: Timestamp) -> DataRate {
        if let EstimatorState::RttBackoff {
            last_drop,
            held_rate,
        } = self.state
        {
            if at_time - last_drop < self.rtt_backoff.drop_interval {
                return std::cmp::min(candidate, held_rate);
            }
        }

        if self.rtt_backoff.is_rtt_above_limit(at_time) {
            let held_rate = std::cmp::min(candidate, self.rtt_backoff.backoff_ceiling());
            tracing::warn!(
                "rtt {:?} above limit {:?}, backing off to {:?}",
                self.rtt_backoff.corrected_rtt(at_time),
                self.rtt_backoff.rtt_limit,
                held_rate
            );
            self.state = EstimatorState::RttBackoff {
                last_drop: at_time,
                held_rate,
            };
            self.time_last_decrease = at_time;
            self.link_capacity.on_rtt_backoff(held_rate, at_time);
            return held_rate;
        }

        if let EstimatorState::RttBackoff { .. } = self.state {
            tracing::info!("rtt back under limit, leaving backoff");
            self.state = EstimatorState::SteadyState;
        }
        candidate
    }

    fn is_in_start_phase(&self, at_time: Timestamp) -> bool {
        self.first_report_time.is_infinite() || at_time - self.first_report_time < Self::START_PHASE
    }

    fn update_startup_stats(&mut self, at_time: Timestamp, packets_lost: i64) {
        let since_first_report = at_time - self.first_report_time;
        for threshold in Self::RAMPUP_THRESHOLDS {
            let reached = self
                .startup_stats
                .rampup_times
                .iter()
                .any(|(rate, _)| *rate == threshold);
            if !reached && self.current_target >= threshold {
                tracing::debug!("reached {:?} after {:?}", threshold, since_first_report);
                self.startup_stats
                    .rampup_times
                    .push((threshold, since_first_report));
            }
        }

        if self.is_in_start_phase(at_time) {
            self.startup_stats.initially_lost_packets += packets_lost;
        } else if self.report_progress == ReportProgress::NoUpdate {
            self.report_progress = ReportProgress::FirstDone;
            self.startup_stats.bitrate_at_2_seconds = Some(self.current_target);
            tracing::info!(
                "initial estimate {:?}, {} packets lost during start",
                self.current_target,
                self.startup_stats.initially_lost_packets
            );
        } else if self.report_progress == ReportProgress::FirstDone
            && since_first_report >= Self::BWE_CONVERGENCE_TIME
        {
            self.report_progress = ReportProgress::Done;
            let initial = self
                .startup_stats
                .bitrate_at_2_seconds
                .unwrap_or(self.current_target);
            let diff = initial - self.current_target;
            self.startup_stats.converged_diff = Some(diff);
            tracing::info!("converged estimate {:?}, {:?} below initial", self.current_target, diff);
        }
    }

    // Updates history of min bitrates.
    // After this method returns self.min_bitrate_history.front().1 contains the
    // min bitrate used during last BWE_INCREASE_INTERVAL.
    pub fn update_min_history(&mut self, at_time: Timestamp) {
        // Remove old data points from history.
        // Since history precision is in ms, add one so it is able to increase
        // bitrate if it is off by as little as 0.5ms.
        while let Some((oldest, _)) = self.min_bitrate_history.front() {
            if at_time - *oldest + TimeDelta::from_millis(1) > Self::BWE_INCREASE_INTERVAL {
                self.min_bitrate_history.pop_front();
            } else {
                break;
            }
        }

        // Typical minimum sliding-window algorithm: Pop values higher than current
        // bitrate before pushing it.
        while let Some((_, newest)) = self.min_bitrate_history.back() {
            if self.current_target <= *newest {
                self.min_bitrate_history.pop_back();
            } else {
                break;
            }
        }

        self.min_bitrate_history
            .push_back((at_time, self.current_target));
    }

    // Gets the upper limit for the target bitrate. This is the minimum of the
    // delay based limit, the receiver limit and the tracked link capacity.
    pub fn get_upper_limit(&self) -> DataRate {
        let capacity_limit =
            self.link_capacity.estimate() * self.config.link_capacity_safety_factor;
        self.delay_based_limit
            .min(self.receiver_limit)
            .min(capacity_limit)
            .min(self.max_bitrate_configured)
    }

    // Prints a warning if `bitrate` if sufficiently long time has past since last
    // warning.
    fn maybe_log_low_bitrate_warning(&mut self, bitrate: DataRate, at_time: Timestamp) {
        if at_time - self.last_low_bitrate_log > Self::LOW_BITRATE_LOG_PERIOD {
            tracing::warn!(
                "Estimated available bandwidth {:?} is below configured min bitrate {:?}.",
                bitrate,
                self.min_bitrate_configured
            );
            self.last_low_bitrate_log = at_time;
        }
    }

    fn maybe_log_target(&mut self, at_time: Timestamp) {
        if self.current_target != self.last_logged_target
            || self.last_fraction_loss != self.last_logged_fraction_loss
            || at_time - self.last_target_log > Self::TARGET_LOG_PERIOD
        {
            tracing::debug!(
                target_rate = ?self.current_target,
                fraction_loss = self.last_fraction_loss,
                state = ?self.state,
                "loss based estimate"
            );
            self.last_logged_target = self.current_target;
            self.last_logged_fraction_loss = self.last_fraction_loss;
            self.last_target_log = at_time;
        }
    }

    // Cap `bitrate` to [self.min_bitrate_configured, max_bitrate_configured_] and
    // set `current_bitrate_` to the capped value.
    fn update_target_bitrate(&mut self, mut new_bitrate: DataRate, at_time: Timestamp) {
        new_bitrate = std::cmp::min(new_bitrate, self.get_upper_limit());
        if new_bitrate < self.min_bitrate_configured {
            self.maybe_log_low_bitrate_warning(new_bitrate, at_time);
            new_bitrate = self.min_bitrate_configured;
        }
        self.current_target = new_bitrate;
        self.maybe_log_target(at_time);
        self.link_capacity
            .on_rate_update(self.acknowledged_rate, self.current_target, at_time);
    }

    // Applies lower and upper bounds to the current target rate.
    fn apply_target_limits(&mut self, at_time: Timestamp) {
        self.update_target_bitrate(self.current_target, at_time);
    }
}

#[cfg(test)]
mod test {
    use test_trace::test;

    use super::*;
    use crate::api::transport::PacketResult;

    fn bwe_with_band(min_bps: i64, max_bps: i64, start_bps: i64) -> LossBasedBweV0 {
        let mut config = Config::default();
        config.bitrates.min = DataRate::from_bits_per_sec(min_bps);
        config.bitrates.max = DataRate::from_bits_per_sec(max_bps);
        config.bitrates.start = DataRate::from_bits_per_sec(start_bps);
        LossBasedBweV0::new(&config)
    }

    fn sent(sequence_number: i64, send_ms: i64) -> SentPacket {
        SentPacket {
            send_time: Timestamp::from_millis(send_ms),
            sequence_number,
            ..Default::default()
        }
    }

    fn feedback(feedback_ms: i64, packets: &[(i64, i64, Option<i64>)]) -> TransportPacketsFeedback {
        TransportPacketsFeedback {
            feedback_time: Timestamp::from_millis(feedback_ms),
            packet_feedbacks: packets
                .iter()
                .map(|(seq, send_ms, receive_ms)| PacketResult {
                    sent_packet: sent(*seq, *send_ms),
                    receive_time: receive_ms
                        .map_or(Timestamp::plus_infinity(), Timestamp::from_millis),
                })
                .collect(),
        }
    }

    fn test_probing(use_delay_based: bool) {
        let mut bwe = bwe_with_band(100000, 1500000, 200000);
        let mut now_ms: i64 = 0;

        const REMB_BPS: i64 = 1000000;
        const SECOND_REMB_BPS: i64 = REMB_BPS + 500000;

        bwe.update_packets_lost(
            /*packets_lost=*/ 0,
            /*number_of_packets=*/ 1,
            Timestamp::from_millis(now_ms),
        );
        bwe.update_rtt(TimeDelta::from_millis(50), Timestamp::from_millis(now_ms));

        // Initial REMB applies immediately.
        if use_delay_based {
            bwe.update_delay_based_estimate(
                Timestamp::from_millis(now_ms),
                DataRate::from_bits_per_sec(REMB_BPS),
            );
        } else {
            bwe.update_receiver_estimate(
                Timestamp::from_millis(now_ms),
                DataRate::from_bits_per_sec(REMB_BPS),
            );
        }
        bwe.update_estimate(Timestamp::from_millis(now_ms));
        assert_eq!(REMB_BPS, bwe.target_rate().bps());

        // Second REMB doesn't apply immediately.
        now_ms += 2001;
        if use_delay_based {
            bwe.update_delay_based_estimate(
                Timestamp::from_millis(now_ms),
                DataRate::from_bits_per_sec(SECOND_REMB_BPS),
            );
        } else {
            bwe.update_receiver_estimate(
                Timestamp::from_millis(now_ms),
                DataRate::from_bits_per_sec(SECOND_REMB_BPS),
            );
        }
        bwe.update_estimate(Timestamp::from_millis(now_ms));
        assert_eq!(REMB_BPS, bwe.target_rate().bps());
    }

    #[test]
    fn initial_remb_with_probing() {
        test_probing(false);
    }

    #[test]
    fn initial_delay_based_bwe_with_probing() {
        test_probing(true);
    }

    #[test]
    fn starts_at_configured_rate_clamped_into_band() {
        let bwe = bwe_with_band(100_000, 2_000_000, 2_000_000);
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(2000));
        assert_eq!(bwe.state(), EstimatorState::Start);

        let bwe = bwe_with_band(100_000, 2_000_000, 5_000_000);
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(2000));

        let bwe = bwe_with_band(100_000, 2_000_000, 50_000);
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(100));
    }

    #[test]
    fn inverted_band_uses_max() {
        let mut bwe = bwe_with_band(100_000, 2_000_000, 300_000);
        bwe.set_min_max_bitrate(
            DataRate::from_kilobits_per_sec(900),
            DataRate::from_kilobits_per_sec(500),
        );
        assert_eq!(bwe.get_min_bitrate(), 500_000);

        bwe.update_estimate(Timestamp::from_millis(0));
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(500));
    }

    #[test]
    fn heavy_loss_decreases_target() {
        let mut bwe = bwe_with_band(100_000, 2_000_000, 1_000_000);
        let now = Timestamp::from_seconds(10);
        let before = bwe.target_rate();

        bwe.update_packets_lost(50, 100, now);
        bwe.update_estimate(now);

        assert!(bwe.target_rate() < before);
        assert_eq!(bwe.fraction_loss(), 128);
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(750));
        assert_eq!(bwe.state(), EstimatorState::SteadyState);
        assert!(bwe.decreased_since_last_loss_report);
    }

    #[test]
    fn low_loss_increases_target_until_max() {
        const MAX_BPS: i64 = 400_000;
        let mut bwe = bwe_with_band(100_000, MAX_BPS, 200_000);
        let mut now_ms: i64 = 0;
        let mut last = bwe.target_rate();

        for _ in 0..30 {
            now_ms += 1000;
            bwe.update_packets_lost(1, 100, Timestamp::from_millis(now_ms));
            bwe.update_estimate(Timestamp::from_millis(now_ms));
            let target = bwe.target_rate();
            if last.bps() < MAX_BPS {
                assert!(target > last, "{:?} did not increase from {:?}", target, last);
            } else {
                assert_eq!(target.bps(), MAX_BPS);
            }
            assert!(target.bps() <= MAX_BPS);
            last = target;
        }
        assert_eq!(last.bps(), MAX_BPS);
    }

    #[test]
    fn doesnt_reapply_bitrate_decrease_without_following_remb() {
        let mut bwe = bwe_with_band(100000, 1500000, 1000000);
        const MIN_BITRATE_BPS: i64 = 100000;
        const INITIAL_BITRATE_BPS: i64 = 1000000;
        const FRACTION_LOSS: u8 = 128;
        const RTT_MS: i64 = 50;
        let mut now_ms: i64 = 11000;

        assert_eq!(INITIAL_BITRATE_BPS, bwe.target_rate().bps());
        assert_eq!(0, bwe.fraction_loss());
        assert_eq!(0, bwe.round_trip_time().ms());

        // Signal heavy loss to go down in bitrate.
        bwe.update_packets_lost(50, 100, Timestamp::from_millis(now_ms));
        bwe.update_rtt(TimeDelta::from_millis(RTT_MS), Timestamp::from_millis(now_ms));

        // Trigger an update 1 second later to not be rate limited.
        now_ms += 1000;
        bwe.update_estimate(Timestamp::from_millis(now_ms));
        assert!(bwe.target_rate().bps() < INITIAL_BITRATE_BPS);
        // Verify that the obtained bitrate isn't hitting the min bitrate, or this
        // test doesn't make sense.
        assert!(bwe.target_rate().bps() > MIN_BITRATE_BPS);
        assert_eq!(FRACTION_LOSS, bwe.fraction_loss());
        assert_eq!(RTT_MS, bwe.round_trip_time().ms());

        // Triggering an update shouldn't apply further downgrade nor upgrade since
        // there's no intermediate receiver block received indicating whether this is
        // currently good or not.
        let last_bitrate_bps: i64 = bwe.target_rate().bps();
        now_ms += 1000;
        bwe.update_estimate(Timestamp::from_millis(now_ms));

        assert_eq!(last_bitrate_bps, bwe.target_rate().bps());
        // The old loss rate should still be applied though.
        assert_eq!(FRACTION_LOSS, bwe.fraction_loss());
        assert_eq!(RTT_MS, bwe.round_trip_time().ms());
    }

    #[test]
    fn setting_send_bitrate_overrides_delay_based_estimate() {
        const MIN_BITRATE_BPS: i64 = 10000;
        const MAX_BITRATE_BPS: i64 = 10000000;
        const INITIAL_BITRATE_BPS: i64 = 300000;
        const DELAY_BASED_BITRATE_BPS: i64 = 350000;
        const FORCED_HIGH_BITRATE: i64 = 2500000;
        let mut bwe = bwe_with_band(MIN_BITRATE_BPS, MAX_BITRATE_BPS, INITIAL_BITRATE_BPS);

        let now_ms: i64 = 0;

        bwe.update_delay_based_estimate(
            Timestamp::from_millis(now_ms),
            DataRate::from_bits_per_sec(DELAY_BASED_BITRATE_BPS),
        );
        bwe.update_estimate(Timestamp::from_millis(now_ms));
        assert!(bwe.target_rate().bps() >= INITIAL_BITRATE_BPS);
        assert!(bwe.target_rate().bps() <= DELAY_BASED_BITRATE_BPS);

        // The tracked capacity still limits the forced rate to its safety margin.
        bwe.set_send_bitrate(
            DataRate::from_bits_per_sec(FORCED_HIGH_BITRATE),
            Timestamp::from_millis(now_ms),
        );
        assert_eq!(
            bwe.target_rate(),
            bwe.get_estimated_link_capacity() * 1.5
        );
        assert!(bwe.target_rate().bps() > DELAY_BASED_BITRATE_BPS);
    }

    #[test]
    fn fraction_loss_is_not_overflowed() {
        let mut bwe = bwe_with_band(100000, 1500000, 1000000);
        let now_ms: i64 = 11000;

        assert_eq!(0, bwe.fraction_loss());

        // Signal negative loss.
        bwe.update_packets_lost(-1, 100, Timestamp::from_millis(now_ms));
        assert_eq!(0, bwe.fraction_loss());
    }

    #[test]
    fn empty_loss_report_is_ignored() {
        let mut bwe = bwe_with_band(100000, 1500000, 1000000);
        bwe.update_packets_lost(5, 0, Timestamp::from_millis(1000));
        bwe.update_packets_lost(5, -3, Timestamp::from_millis(1000));
        assert_eq!(bwe.fraction_loss(), 0);
        assert_eq!(bwe.state(), EstimatorState::Start);
        assert_eq!(bwe.target_rate().bps(), 1000000);
    }

    #[test]
    fn rtt_is_above_limit_if_rtt_greater_than_limit() {
        let mut bwe = bwe_with_band(10000, 10000000, 300000);
        bwe.update_propagation_rtt(Timestamp::from_millis(0), TimeDelta::from_millis(5000));
        assert!(bwe.is_rtt_above_limit(Timestamp::from_millis(0)));
    }

    #[test]
    fn rtt_is_below_limit_if_rtt_less_than_limit() {
        let mut bwe = bwe_with_band(10000, 10000000, 300000);
        bwe.update_propagation_rtt(Timestamp::from_millis(0), TimeDelta::from_millis(1000));
        assert!(!bwe.is_rtt_above_limit(Timestamp::from_millis(0)));
    }

    #[test]
    fn high_rtt_drops_to_backoff_floor() {
        let mut config = Config::default();
        config.max_rtt_limit.configured_limit = TimeDelta::from_millis(300);
        let mut bwe = LossBasedBweV0::new(&config);

        bwe.update_propagation_rtt(Timestamp::from_millis(0), TimeDelta::from_millis(500));
        bwe.update_estimate(Timestamp::from_millis(0));

        // The configured min is above the ceiling and wins.
        assert_eq!(bwe.target_rate(), config.max_rtt_limit.bandwidth_floor);
        assert!(matches!(bwe.state(), EstimatorState::RttBackoff { .. }));
    }

    fn backoff_config() -> Config {
        let mut config = Config::default();
        config.bitrates.min = DataRate::from_kilobits_per_sec(10);
        config.bitrates.start = DataRate::from_kilobits_per_sec(1000);
        config.max_rtt_limit.configured_limit = TimeDelta::from_millis(300);
        config.max_rtt_limit.bandwidth_floor = DataRate::from_kilobits_per_sec(100);
        config
    }

    #[test]
    fn backoff_holds_regardless_of_other_signals() {
        let config = backoff_config();
        let ceiling = DataRate::from_kilobits_per_sec(80);
        let mut bwe = LossBasedBweV0::new(&config);

        bwe.update_propagation_rtt(Timestamp::from_millis(0), TimeDelta::from_millis(500));
        bwe.update_estimate(Timestamp::from_millis(0));
        assert_eq!(bwe.target_rate(), ceiling);

        // RTT recovers and every other signal says go, but the hold lasts for the
        // drop interval.
        bwe.update_propagation_rtt(Timestamp::from_millis(100), TimeDelta::from_millis(20));
        for now_ms in (100..1000).step_by(100) {
            let now = Timestamp::from_millis(now_ms);
            bwe.update_receiver_estimate(now, DataRate::from_kilobits_per_sec(5000));
            bwe.update_delay_based_estimate(now, DataRate::from_kilobits_per_sec(5000));
            bwe.update_packets_lost(0, 100, now);
            bwe.update_estimate(now);
            assert!(bwe.target_rate() <= ceiling, "at {}ms: {:?}", now_ms, bwe.target_rate());
        }

        bwe.update_estimate(Timestamp::from_millis(1000));
        assert_eq!(bwe.state(), EstimatorState::SteadyState);
    }

    #[test]
    fn loss_report_during_backoff_decreases_once() {
        let mut config = backoff_config();
        config.bitrates.start = DataRate::from_kilobits_per_sec(2000);
        config.max_rtt_limit.bandwidth_floor = DataRate::from_kilobits_per_sec(1000);
        let mut bwe = LossBasedBweV0::new(&config);

        bwe.update_rtt(TimeDelta::from_millis(500), Timestamp::from_millis(10_000));
        bwe.update_estimate(Timestamp::from_millis(10_000));
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(800));

        // One heavy loss report inside the hold, then the RTT recovers.
        bwe.update_packets_lost(50, 100, Timestamp::from_millis(10_900));
        bwe.update_rtt(TimeDelta::from_millis(50), Timestamp::from_millis(10_900));
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(600));
        assert!(matches!(bwe.state(), EstimatorState::RttBackoff { .. }));

        // Neither the rest of the hold nor leaving it re-applies the report.
        for now_ms in (11_300..=12_500).step_by(400) {
            bwe.update_estimate(Timestamp::from_millis(now_ms));
            assert_eq!(
                bwe.target_rate(),
                DataRate::from_kilobits_per_sec(600),
                "at {}ms",
                now_ms
            );
            assert_eq!(bwe.state(), EstimatorState::SteadyState);
        }
    }

    #[test]
    fn new_loss_report_after_backoff_decreases_again() {
        let mut config = backoff_config();
        config.bitrates.start = DataRate::from_kilobits_per_sec(2000);
        config.max_rtt_limit.bandwidth_floor = DataRate::from_kilobits_per_sec(1000);
        let mut bwe = LossBasedBweV0::new(&config);

        bwe.update_rtt(TimeDelta::from_millis(500), Timestamp::from_millis(10_000));
        bwe.update_estimate(Timestamp::from_millis(10_000));
        bwe.update_packets_lost(50, 100, Timestamp::from_millis(10_900));
        bwe.update_rtt(TimeDelta::from_millis(50), Timestamp::from_millis(10_900));
        bwe.update_estimate(Timestamp::from_millis(11_300));
        assert_eq!(bwe.state(), EstimatorState::SteadyState);
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(600));

        bwe.update_packets_lost(50, 100, Timestamp::from_millis(11_700));
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(450));
        bwe.update_estimate(Timestamp::from_millis(12_100));
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(450));
    }

    #[test]
    fn backoff_repeats_while_rtt_stays_high() {
        let config = backoff_config();
        let mut bwe = LossBasedBweV0::new(&config);

        bwe.update_propagation_rtt(Timestamp::from_millis(0), TimeDelta::from_millis(500));
        bwe.update_estimate(Timestamp::from_millis(0));
        bwe.update_estimate(Timestamp::from_millis(1500));
        assert_eq!(
            bwe.state(),
            EstimatorState::RttBackoff {
                last_drop: Timestamp::from_millis(1500),
                held_rate: DataRate::from_kilobits_per_sec(80),
            }
        );
        assert_eq!(bwe.get_estimated_link_capacity(), DataRate::from_kilobits_per_sec(80));
    }

    #[test]
    fn disabled_backoff_never_triggers() {
        let mut config = backoff_config();
        config.max_rtt_limit.disabled = true;
        let mut bwe = LossBasedBweV0::new(&config);

        bwe.update_propagation_rtt(Timestamp::from_millis(0), TimeDelta::from_seconds(10));
        bwe.update_estimate(Timestamp::from_millis(0));
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(1000));
        assert!(!bwe.is_rtt_above_limit(Timestamp::from_millis(0)));
    }

    #[test]
    fn unbounded_limits_do_not_leak_into_target() {
        let mut bwe = bwe_with_band(100_000, 2_000_000, 300_000);
        bwe.update_receiver_estimate(Timestamp::from_millis(0), DataRate::zero());
        bwe.update_delay_based_estimate(Timestamp::from_millis(0), DataRate::zero());
        bwe.update_estimate(Timestamp::from_millis(0));
        assert!(bwe.target_rate().is_finite());
        assert!(bwe.target_rate().bps() <= 2_000_000);
    }

    #[test]
    fn feedback_is_idempotent() {
        let mut bwe = bwe_with_band(100_000, 2_000_000, 1_000_000);
        for seq in 0..40 {
            bwe.on_sent_packet(&sent(seq, 10_000 + seq));
        }
        let packets: Vec<(i64, i64, Option<i64>)> = (0..40)
            .map(|seq| (seq, 10_000 + seq, if seq % 4 == 0 { None } else { Some(5_000 + seq) }))
            .collect();
        let report = feedback(10_100, &packets);

        bwe.incoming_packet_feedback_vector(&report);
        let target = bwe.target_rate();
        let fraction_loss = bwe.fraction_loss();
        let rtt = bwe.round_trip_time();
        let state = bwe.state();

        bwe.incoming_packet_feedback_vector(&report);
        assert_eq!(bwe.target_rate(), target);
        assert_eq!(bwe.fraction_loss(), fraction_loss);
        assert_eq!(bwe.round_trip_time(), rtt);
        assert_eq!(bwe.state(), state);

        // 10 of 40 lost.
        assert_eq!(fraction_loss, 64);
        // Packet 39 was sent at 10039 and is the latest arrival.
        assert_eq!(rtt, TimeDelta::from_millis(61));
    }

    #[test]
    fn feedback_for_unsent_packets_is_ignored() {
        let mut bwe = bwe_with_band(100_000, 2_000_000, 1_000_000);
        let report = feedback(1000, &[(5, 900, None), (6, 900, None)]);

        // Nothing sent yet.
        bwe.incoming_packet_feedback_vector(&report);
        bwe.on_sent_packet(&sent(0, 900));
        // Sequence numbers above the highest sent one.
        bwe.incoming_packet_feedback_vector(&report);

        bwe.update_estimate(Timestamp::from_millis(1000));
        assert_eq!(bwe.fraction_loss(), 0);
        assert_eq!(bwe.round_trip_time(), TimeDelta::zero());
        assert_eq!(bwe.target_rate().bps(), 1_000_000);
    }

    #[test]
    fn feedback_loss_is_flushed_once_per_interval() {
        let mut bwe = bwe_with_band(100_000, 2_000_000, 1_000_000);
        for seq in 0..100 {
            bwe.on_sent_packet(&sent(seq, 10_000 + seq));
        }

        let first: Vec<_> = (0..30).map(|seq| (seq, 10_000 + seq, Some(5_000 + seq))).collect();
        bwe.incoming_packet_feedback_vector(&feedback(10_200, &first));
        assert_eq!(bwe.fraction_loss(), 0);

        // All lost, but within the loss update interval so only counted.
        let second: Vec<_> = (30..60).map(|seq| (seq, 10_000 + seq, None)).collect();
        bwe.incoming_packet_feedback_vector(&feedback(10_500, &second));
        assert_eq!(bwe.fraction_loss(), 0);

        let third: Vec<_> = (60..90).map(|seq| (seq, 10_000 + seq, Some(5_100 + seq))).collect();
        bwe.incoming_packet_feedback_vector(&feedback(11_300, &third));
        // 30 lost out of 60 since the last flush.
        assert_eq!(bwe.fraction_loss(), 128);
    }

    #[test]
    fn silent_feedback_path_triggers_backoff() {
        let config = backoff_config();
        let mut bwe = LossBasedBweV0::new(&config);

        // Packets keep flowing for a second without any feedback.
        for (seq, send_ms) in (0..=1000).step_by(50).enumerate() {
            bwe.on_sent_packet(&sent(seq as i64, send_ms));
        }
        let now = Timestamp::from_millis(1000);
        assert!(bwe.is_rtt_above_limit(now));
        bwe.update_estimate(now);
        assert_eq!(bwe.target_rate(), DataRate::from_kilobits_per_sec(80));
    }

    #[test]
    fn startup_stats_are_recorded() {
        let mut bwe = bwe_with_band(100_000, 3_000_000, 400_000);
        bwe.update_packets_lost(2, 100, Timestamp::from_millis(0));
        bwe.update_packets_lost(3, 100, Timestamp::from_millis(1000));
        bwe.update_rtt(TimeDelta::from_millis(40), Timestamp::from_millis(1000));
        for now_ms in (2000..=30000).step_by(1000) {
            bwe.update_packets_lost(0, 100, Timestamp::from_millis(now_ms));
        }

        let stats = bwe.startup_stats();
        assert_eq!(stats.initially_lost_packets, 5);
        assert!(stats.bitrate_at_2_seconds.is_some());
        assert_eq!(stats.initial_rtt, Some(TimeDelta::from_millis(40)));
        assert_eq!(stats.converged_diff, Some(DataRate::zero()));
        let thresholds: Vec<DataRate> = stats.rampup_times.iter().map(|(rate, _)| *rate).collect();
        assert_eq!(thresholds, LossBasedBweV0::RAMPUP_THRESHOLDS.to_vec());
    }

    #[test]
    fn reset_restores_construction_state() {
        let mut bwe = bwe_with_band(100_000, 2_000_000, 1_000_000);
        bwe.update_packets_lost(50, 100, Timestamp::from_seconds(10));
        bwe.update_rtt(TimeDelta::from_millis(80), Timestamp::from_seconds(10));
        assert!(bwe.target_rate().bps() < 1_000_000);

        bwe.reset();
        assert_eq!(bwe.target_rate().bps(), 1_000_000);
        assert_eq!(bwe.fraction_loss(), 0);
        assert_eq!(bwe.round_trip_time(), TimeDelta::zero());
        assert_eq!(bwe.state(), EstimatorState::Start);
    }
}
