use crate::api::units::Timestamp;

/// Arrival status of one packet as reported by the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketStatus {
    /// Wire value of the transport-wide sequence number.
    pub sequence_number: u16,
    /// `None` when the receiver reported the packet missing.
    pub receive_time: Option<Timestamp>,
}

/// One transport-wide congestion control feedback message, already parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFeedback {
    /// Local time the feedback arrived.
    pub feedback_time: Timestamp,
    pub packets: Vec<PacketStatus>,
}

impl TransportFeedback {
    pub fn new(feedback_time: Timestamp) -> Self {
        Self {
            feedback_time,
            packets: Vec::new(),
        }
    }

    pub fn add_received(&mut self, sequence_number: u16, receive_time: Timestamp) {
        self.packets.push(PacketStatus {
            sequence_number,
            receive_time: Some(receive_time),
        });
    }

    pub fn add_lost(&mut self, sequence_number: u16) {
        self.packets.push(PacketStatus {
            sequence_number,
            receive_time: None,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
