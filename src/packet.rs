use bytes::Bytes;

/// An RTP packet on its way to the network.
///
/// Header serialization happens elsewhere; the pacer only needs the identity
/// of the packet, its wire size and a slot for the transport-wide sequence
/// number it attaches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub ssrc: u32,
    pub sequence_number: u16,
    /// Serialized packet, header included.
    pub data: Bytes,
    /// Set by the pacer right before the packet is sent.
    pub transport_sequence_number: Option<u16>,
}

impl RtpPacket {
    pub fn new(ssrc: u32, sequence_number: u16, data: impl Into<Bytes>) -> Self {
        Self {
            ssrc,
            sequence_number,
            data: data.into(),
            transport_sequence_number: None,
        }
    }

    /// Size on the wire in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
