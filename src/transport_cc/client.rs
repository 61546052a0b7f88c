use super::{feedback::TransportFeedback, send_history::SendHistory};
use crate::{
    acknowledged_bitrate_estimator::AcknowledgedBitrateEstimator,
    api::{
        transport::{
            PacedPacketInfo, RemoteBitrateReport, RoundTripTimeUpdate, RtpPacketSendInfo,
            TransportLossReport,
        },
        units::{DataRate, TimeDelta, Timestamp},
    },
    config::Config,
    loss_based_bwe_v0::LossBasedBweV0,
};

/// Sits between the pacer and the bandwidth estimator.
///
/// Packets are registered with `insert_packet` before they reach the wire and
/// confirmed with `packet_sent`, so feedback that races the send still finds
/// them. Every feedback signal ends up in the owned `LossBasedBweV0`.
pub struct TransportCongestionControlClient {
    pacing_interval: TimeDelta,
    send_history: SendHistory,
    acknowledged_bitrate_estimator: AcknowledgedBitrateEstimator,
    bandwidth_estimation: LossBasedBweV0,
}

impl TransportCongestionControlClient {
    pub fn new(config: &Config) -> Self {
        Self {
            pacing_interval: config.pacing.interval,
            send_history: SendHistory::default(),
            acknowledged_bitrate_estimator: AcknowledgedBitrateEstimator::default(),
            bandwidth_estimation: LossBasedBweV0::new(config),
        }
    }

    pub fn insert_packet(&mut self, packet_info: &RtpPacketSendInfo) {
        self.send_history.add_packet(packet_info);
    }

    pub fn packet_sent(&mut self, packet_info: &RtpPacketSendInfo, send_time_ms: i64) {
        let send_time = Timestamp::from_millis(send_time_ms);
        if let Some(sent_packet) = self.send_history.process_sent_packet(packet_info, send_time) {
            self.bandwidth_estimation.on_sent_packet(&sent_packet);
        }
    }

    pub fn get_pacing_info(&self) -> PacedPacketInfo {
        let send_bitrate = self.bandwidth_estimation.target_rate();
        PacedPacketInfo {
            send_bitrate,
            pacing_interval: self.pacing_interval,
            bytes_per_interval: send_bitrate * self.pacing_interval,
        }
    }

    pub fn on_transport_feedback(&mut self, feedback: &TransportFeedback) {
        let report = self.send_history.process_feedback(feedback);
        if report.packet_feedbacks.is_empty() {
            tracing::debug!("transport feedback matched no sent packets");
            return;
        }

        self.acknowledged_bitrate_estimator
            .incoming_packet_feedback(&report.sorted_by_receive_time());
        self.bandwidth_estimation.set_acknowledged_rate(
            self.acknowledged_bitrate_estimator.bitrate(),
            report.feedback_time,
        );
        self.bandwidth_estimation
            .incoming_packet_feedback_vector(&report);
    }

    pub fn on_transport_loss_report(&mut self, report: &TransportLossReport) {
        let total_packets_delta = report.packets_lost_delta + report.packets_received_delta;
        self.bandwidth_estimation.update_packets_lost(
            report.packets_lost_delta as i64,
            total_packets_delta as i64,
            report.receive_time,
        );
    }

    pub fn on_round_trip_time_update(&mut self, update: &RoundTripTimeUpdate) {
        if update.smoothed {
            return;
        }
        self.bandwidth_estimation
            .update_rtt(update.round_trip_time, update.receive_time);
    }

    pub fn on_remote_bitrate_report(&mut self, report: &RemoteBitrateReport) {
        self.bandwidth_estimation
            .update_receiver_estimate(report.receive_time, report.bandwidth);
    }

    pub fn on_delay_based_estimate(&mut self, at_time: Timestamp, bitrate: DataRate) {
        self.bandwidth_estimation
            .update_delay_based_estimate(at_time, bitrate);
    }

    /// Changes the allowed band and, when `send_bitrate` is given, forces the
    /// target to it.
    pub fn set_bitrates(
        &mut self,
        send_bitrate: Option<DataRate>,
        min_bitrate: DataRate,
        max_bitrate: DataRate,
        at_time: Timestamp,
    ) {
        if send_bitrate.is_some() {
            self.acknowledged_bitrate_estimator.expect_fast_rate_change();
        }
        self.bandwidth_estimation
            .set_bitrates(send_bitrate, min_bitrate, max_bitrate, at_time);
    }

    pub fn on_process_interval(&mut self, at_time: Timestamp) {
        self.bandwidth_estimation.update_estimate(at_time);
    }

    pub fn target_rate(&self) -> DataRate {
        self.bandwidth_estimation.target_rate()
    }

    pub fn bandwidth_estimation(&self) -> &LossBasedBweV0 {
        &self.bandwidth_estimation
    }

    pub fn send_history(&self) -> &SendHistory {
        &self.send_history
    }
}
