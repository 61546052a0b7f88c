use crate::api::units::{DataRate, DataSize, TimeDelta, Timestamp};

/// Pacing parameters attached to each outgoing packet, derived from the
/// current target rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacedPacketInfo {
    pub send_bitrate: DataRate,
    /// Length of one pacing tick.
    pub pacing_interval: TimeDelta,
    /// Bytes the pacer may release per tick at `send_bitrate`.
    pub bytes_per_interval: DataSize,
}

impl Default for PacedPacketInfo {
    fn default() -> Self {
        Self {
            send_bitrate: DataRate::zero(),
            pacing_interval: TimeDelta::zero(),
            bytes_per_interval: DataSize::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SentPacket {
    pub send_time: Timestamp,
    /// Size of the packet as handed to the transport.
    pub size: DataSize,
    pub pacing_info: PacedPacketInfo,
    /// Transport independent sequence number, any tracked packet should have a
    /// sequence number that is unique over the whole call and increasing by 1 for
    /// each packet.
    pub sequence_number: i64,
}

impl Default for SentPacket {
    fn default() -> Self {
        Self {
            send_time: Timestamp::plus_infinity(),
            size: DataSize::zero(),
            pacing_info: PacedPacketInfo::default(),
            sequence_number: 0,
        }
    }
}

/// What the sender knows about an RTP packet when it hands it to the
/// transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtpPacketSendInfo {
    pub ssrc: u32,
    /// Wire value of the transport-wide sequence number.
    pub transport_sequence_number: u16,
    pub rtp_sequence_number: Option<u16>,
    pub length: usize,
    pub pacing_info: PacedPacketInfo,
}

// Transport level feedback

#[derive(Debug, Clone, Copy)]
pub struct RemoteBitrateReport {
    pub receive_time: Timestamp,
    pub bandwidth: DataRate,
}

impl Default for RemoteBitrateReport {
    fn default() -> Self {
        Self {
            receive_time: Timestamp::plus_infinity(),
            bandwidth: DataRate::infinity(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoundTripTimeUpdate {
    pub receive_time: Timestamp,
    pub round_trip_time: TimeDelta,
    pub smoothed: bool,
}

impl Default for RoundTripTimeUpdate {
    fn default() -> Self {
        Self {
            receive_time: Timestamp::plus_infinity(),
            round_trip_time: TimeDelta::plus_infinity(),
            smoothed: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TransportLossReport {
    pub receive_time: Timestamp,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub packets_lost_delta: u64,
    pub packets_received_delta: u64,
}

impl Default for TransportLossReport {
    fn default() -> Self {
        Self {
            receive_time: Timestamp::plus_infinity(),
            start_time: Timestamp::plus_infinity(),
            end_time: Timestamp::plus_infinity(),
            packets_lost_delta: 0,
            packets_received_delta: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PacketResult {
    pub sent_packet: SentPacket,
    /// `plus_infinity` when the packet was reported lost.
    pub receive_time: Timestamp,
}

impl PacketResult {
    pub const fn is_received(&self) -> bool {
        !self.receive_time.is_plus_infinity()
    }
}

impl Default for PacketResult {
    fn default() -> Self {
        Self {
            sent_packet: SentPacket::default(),
            receive_time: Timestamp::plus_infinity(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportPacketsFeedback {
    pub feedback_time: Timestamp,
    pub packet_feedbacks: Vec<PacketResult>,
}

impl Default for TransportPacketsFeedback {
    fn default() -> Self {
        Self {
            feedback_time: Timestamp::plus_infinity(),
            packet_feedbacks: Vec::new(),
        }
    }
}

impl TransportPacketsFeedback {
    /// Received packets, borrowed. Use collect() for an owned copy.
    pub fn received_with_send_info(&self) -> impl Iterator<Item = &PacketResult> {
        self.packet_feedbacks.iter().filter(|fb| fb.is_received())
    }

    pub fn lost_with_send_info(&self) -> impl Iterator<Item = &PacketResult> {
        self.packet_feedbacks.iter().filter(|fb| !fb.is_received())
    }

    pub fn sorted_by_receive_time(&self) -> Vec<PacketResult> {
        let mut res: Vec<PacketResult> = self.received_with_send_info().cloned().collect();
        res.sort_by(|a, b| a.receive_time.cmp(&b.receive_time));
        res
    }
}
