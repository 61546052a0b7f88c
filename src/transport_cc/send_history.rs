use std::collections::BTreeMap;

use super::feedback::TransportFeedback;
use crate::{
    api::{
        transport::{PacketResult, RtpPacketSendInfo, SentPacket, TransportPacketsFeedback},
        units::{DataSize, TimeDelta, Timestamp},
    },
    sequence_number_unwrapper::SequenceNumberUnwrapper,
};

/// Packets handed to the transport, keyed by unwrapped transport sequence
/// number, kept until feedback for them is no longer plausible.
pub struct SendHistory {
    history: BTreeMap<i64, SentPacket>,
    unwrapper: SequenceNumberUnwrapper,
    last_send_time: Timestamp,
    last_sent_sequence_number: i64,
}

impl Default for SendHistory {
    fn default() -> Self {
        Self {
            history: BTreeMap::new(),
            unwrapper: SequenceNumberUnwrapper::default(),
            last_send_time: Timestamp::minus_infinity(),
            last_sent_sequence_number: i64::MIN,
        }
    }
}

impl SendHistory {
    pub const SEND_TIME_HISTORY_WINDOW: TimeDelta = TimeDelta::from_seconds(60);

    pub fn add_packet(&mut self, packet_info: &RtpPacketSendInfo) -> i64 {
        let sequence_number = self
            .unwrapper
            .unwrap(packet_info.transport_sequence_number);
        let sent = SentPacket {
            send_time: Timestamp::plus_infinity(),
            size: DataSize::from(packet_info.length),
            pacing_info: packet_info.pacing_info,
            sequence_number,
        };
        self.history.insert(sequence_number, sent);
        sequence_number
    }

    /// Marks a packet as transmitted. Returns `None` for packets that were
    /// never added or were already sent.
    pub fn process_sent_packet(
        &mut self,
        packet_info: &RtpPacketSendInfo,
        send_time: Timestamp,
    ) -> Option<SentPacket> {
        let sequence_number = self
            .unwrapper
            .peek_unwrap(packet_info.transport_sequence_number);
        let entry = match self.history.get_mut(&sequence_number) {
            Some(entry) => entry,
            None => {
                tracing::debug!(sequence_number, "sent packet was never inserted");
                return None;
            }
        };
        if entry.send_time.is_finite() {
            tracing::debug!(sequence_number, "packet already marked as sent");
            return None;
        }
        entry.send_time = send_time;
        let sent = *entry;

        self.last_send_time = std::cmp::max(self.last_send_time, send_time);
        self.last_sent_sequence_number =
            std::cmp::max(self.last_sent_sequence_number, sequence_number);
        self.prune();
        Some(sent)
    }

    /// Matches feedback against the history. Unknown and never sent packets
    /// are dropped.
    pub fn process_feedback(&self, feedback: &TransportFeedback) -> TransportPacketsFeedback {
        let mut report = TransportPacketsFeedback {
            feedback_time: feedback.feedback_time,
            packet_feedbacks: Vec::with_capacity(feedback.packets.len()),
        };

        let mut unknown = 0;
        for status in &feedback.packets {
            let sequence_number = self.unwrapper.peek_unwrap(status.sequence_number);
            match self.history.get(&sequence_number) {
                Some(sent) if sent.send_time.is_finite() => {
                    report.packet_feedbacks.push(PacketResult {
                        sent_packet: *sent,
                        receive_time: status
                            .receive_time
                            .unwrap_or(Timestamp::plus_infinity()),
                    });
                }
                _ => unknown += 1,
            }
        }

        if unknown > 0 {
            tracing::debug!(
                unknown,
                total = feedback.packets.len(),
                "feedback for packets not in send history"
            );
        }
        report
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn prune(&mut self) {
        let oldest_allowed = self.last_send_time - Self::SEND_TIME_HISTORY_WINDOW;
        while let Some(entry) = self.history.first_entry() {
            let send_time = entry.get().send_time;
            // Packets inserted but skipped by the sender would otherwise pin
            // the history.
            let abandoned = send_time.is_infinite() && *entry.key() < self.last_sent_sequence_number;
            if abandoned || send_time < oldest_allowed {
                entry.remove();
            } else {
                break;
            }
        }
    }
}
