use std::net::SocketAddr;

use super::pacing_budget::PacingBudget;
use crate::{
    api::{
        transport::RtpPacketSendInfo,
        units::{TimeDelta, Timestamp},
    },
    config::{Config, ConfigError},
    packet::RtpPacket,
    transport_cc::TransportCongestionControlClient,
};

/// Source of media packets for the pacer.
pub trait PacketProducer {
    /// Next packet to send, or `None` when nothing is queued.
    fn create_data(&mut self) -> Option<RtpPacket>;
}

/// Receives every packet the pacer releases.
pub trait PublisherObserver {
    fn on_publisher_send_packet(&mut self, packet: RtpPacket, remote_addr: SocketAddr);
}

/// Fixed-interval pacing loop.
///
/// Each `on_timer` tick turns the current target rate into a byte budget and
/// pulls packets from the producer until the budget is spent or the producer
/// runs dry.
pub struct Publisher<P, O> {
    remote_addr: SocketAddr,
    producer: P,
    observer: O,
    tcc_client: TransportCongestionControlClient,
    budget: PacingBudget,
    tcc_seq: u16,
}

impl<P: PacketProducer, O: PublisherObserver> Publisher<P, O> {
    pub fn new(
        config: &Config,
        remote_addr: SocketAddr,
        producer: P,
        observer: O,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        tracing::info!(
            %remote_addr,
            interval = ?config.pacing.interval,
            start = ?config.bitrates.start,
            "publisher created"
        );

        Ok(Self {
            remote_addr,
            producer,
            observer,
            tcc_client: TransportCongestionControlClient::new(config),
            budget: PacingBudget::new(config.pacing.interval),
            tcc_seq: 0,
        })
    }

    pub fn on_timer(&mut self, now: Timestamp) {
        self.budget
            .increase_budget(self.tcc_client.target_rate());

        while self.budget.has_budget() {
            let mut packet = match self.producer.create_data() {
                Some(packet) => packet,
                None => {
                    self.budget.drop_underuse();
                    return;
                }
            };

            self.tcc_seq = self.tcc_seq.wrapping_add(1);
            packet.transport_sequence_number = Some(self.tcc_seq);

            let packet_info = RtpPacketSendInfo {
                ssrc: packet.ssrc,
                transport_sequence_number: self.tcc_seq,
                rtp_sequence_number: Some(packet.sequence_number),
                length: packet.size(),
                pacing_info: self.tcc_client.get_pacing_info(),
            };
            self.tcc_client.insert_packet(&packet_info);
            self.tcc_client.packet_sent(&packet_info, now.ms());

            let size = packet.size();
            tracing::trace!(
                transport_sequence_number = self.tcc_seq,
                size,
                "sending packet"
            );
            self.observer
                .on_publisher_send_packet(packet, self.remote_addr);
            self.budget.use_budget(size);
        }
    }

    pub fn interval(&self) -> TimeDelta {
        self.budget.interval()
    }

    /// Budget left over from the last tick; negative after an overshoot.
    pub fn carry_over_bytes(&self) -> i64 {
        self.budget.bytes_remaining()
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn tcc_client(&self) -> &TransportCongestionControlClient {
        &self.tcc_client
    }

    pub fn tcc_client_mut(&mut self) -> &mut TransportCongestionControlClient {
        &mut self.tcc_client
    }

    pub fn producer_mut(&mut self) -> &mut P {
        &mut self.producer
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }
}
