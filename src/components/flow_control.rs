//! Flow Control Component
//!
//! Manages receive and send windows, and the acceptability test for incoming
//! sequence numbers.

use log::trace;

use crate::components::ReliableOrderedDeliveryState;
use crate::tcp_proto::{seq_between, seq_gt, seq_le, seq_lt};
use crate::tcp_types::TcpSegment;

/// Flow Control State
pub struct FlowControlState {
    /* Peer's Receive Window */
    pub snd_wnd: u32,          // Window the remote peer advertised

    /* Our Receive Window */
    pub rcv_wnd: u32,          // Space we advertise, shrinks as payload is accepted
}

impl FlowControlState {
    pub fn new(rcv_wnd: u32) -> Self {
        Self { snd_wnd: 0, rcv_wnd }
    }

    /// Check whether the segment overlaps the receive window.
    ///
    /// A closed window still admits one sequence number so zero-window
    /// probes get through.
    pub fn is_seq_valid(&self, rod: &ReliableOrderedDeliveryState, seg: &TcpSegment) -> bool {
        let rcv_end = rod.rcv_nxt.wrapping_add(self.rcv_wnd.max(1));
        seq_lt(seg.seq, rcv_end) && seq_le(rod.rcv_nxt, seg.seq_end)
    }

    /// Take the peer's advertised window from `seg`.
    ///
    /// Returns true when a closed window reopened, i.e. a writer blocked on
    /// it must be woken.
    fn update_window(&mut self, seg: &TcpSegment) -> bool {
        let old_snd_wnd = self.snd_wnd;
        self.snd_wnd = u32::from(seg.rwnd);
        old_snd_wnd == 0 && self.snd_wnd > 0
    }

    /// Update the send window only for acks inside `[snd_una, snd_nxt]`.
    ///
    /// An accepted ack also moves `snd_una` forward. Returns true when a
    /// blocked writer must be woken: the window reopened, or acked bytes
    /// left flight and slid the right edge.
    pub fn update_window_safe(
        &mut self,
        rod: &mut ReliableOrderedDeliveryState,
        seg: &TcpSegment,
    ) -> bool {
        if !seq_between(rod.snd_una, seg.ack, rod.snd_nxt) {
            trace!("stale ack {} outside [{}, {}]", seg.ack, rod.snd_una, rod.snd_nxt);
            return false;
        }
        let advanced = seq_gt(seg.ack, rod.snd_una);
        if advanced {
            rod.snd_una = seg.ack;
        }
        let reopened = self.update_window(seg);
        reopened || (advanced && self.snd_wnd > 0)
    }

    /// Bytes that may still be sent: the peer's right edge
    /// `snd_una + snd_wnd` minus what is already in flight.
    pub fn usable_window(&self, rod: &ReliableOrderedDeliveryState) -> u32 {
        let right_edge = rod.snd_una.wrapping_add(self.snd_wnd);
        if seq_le(right_edge, rod.snd_nxt) {
            0
        } else {
            right_edge.wrapping_sub(rod.snd_nxt)
        }
    }

    /// Account for `len` bytes accepted into the receive buffer.
    pub fn consume_rcv_wnd(&mut self, len: u32) {
        self.rcv_wnd = self.rcv_wnd.saturating_sub(len);
    }

    /// Give back `len` bytes of receive window after the application read them.
    pub fn release_rcv_wnd(&mut self, len: u32) {
        self.rcv_wnd = self.rcv_wnd.saturating_add(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tcp_proto::TcpFlags;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn seg(seq: u32, payload: &[u8], ack: u32, rwnd: u16) -> TcpSegment {
        let a = SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1);
        TcpSegment::new(a, a, TcpFlags::ACK, seq, ack, rwnd, payload)
    }

    #[test]
    fn test_zero_window_admits_one_byte() {
        let fc = FlowControlState::new(0);
        let mut rod = ReliableOrderedDeliveryState::new();
        rod.rcv_nxt = 100;

        assert!(fc.is_seq_valid(&rod, &seg(100, b"x", 0, 0)));
        assert!(!fc.is_seq_valid(&rod, &seg(101, b"x", 0, 0)));
    }

    #[test]
    fn test_old_segment_rejected() {
        let fc = FlowControlState::new(1000);
        let mut rod = ReliableOrderedDeliveryState::new();
        rod.rcv_nxt = 100;

        assert!(!fc.is_seq_valid(&rod, &seg(90, b"abc", 0, 0)));
        assert!(fc.is_seq_valid(&rod, &seg(98, b"abc", 0, 0)));
        assert!(fc.is_seq_valid(&rod, &seg(100, b"", 0, 0)));
    }

    #[test]
    fn test_window_across_wrap() {
        let fc = FlowControlState::new(100);
        let mut rod = ReliableOrderedDeliveryState::new();
        rod.rcv_nxt = u32::MAX - 10;

        assert!(fc.is_seq_valid(&rod, &seg(20, b"abc", 0, 0)));
        assert!(!fc.is_seq_valid(&rod, &seg(200, b"abc", 0, 0)));
    }

    #[test]
    fn test_stale_ack_keeps_window() {
        let mut fc = FlowControlState::new(1000);
        fc.snd_wnd = 500;
        let mut rod = ReliableOrderedDeliveryState::new();
        rod.snd_una = 50;
        rod.snd_nxt = 100;

        assert!(!fc.update_window_safe(&mut rod, &seg(0, b"", 30, 9000)));
        assert_eq!(fc.snd_wnd, 500);

        assert!(fc.update_window_safe(&mut rod, &seg(0, b"", 75, 9000)));
        assert_eq!(fc.snd_wnd, 9000);
        assert_eq!(rod.snd_una, 75);
    }

    #[test]
    fn test_reopened_window_requests_wake() {
        let mut fc = FlowControlState::new(1000);
        let mut rod = ReliableOrderedDeliveryState::new();
        rod.snd_una = 10;
        rod.snd_nxt = 10;

        assert!(!fc.update_window_safe(&mut rod, &seg(0, b"", 10, 0)));
        assert!(fc.update_window_safe(&mut rod, &seg(0, b"", 10, 4096)));
        assert!(!fc.update_window_safe(&mut rod, &seg(0, b"", 10, 8192)));
    }

    #[test]
    fn test_usable_window_counts_bytes_in_flight() {
        let mut fc = FlowControlState::new(1000);
        let mut rod = ReliableOrderedDeliveryState::new();
        rod.snd_una = u32::MAX - 99;
        rod.snd_nxt = 400;
        fc.snd_wnd = 1000;
        assert_eq!(fc.usable_window(&rod), 500);

        fc.snd_wnd = 300;
        assert_eq!(fc.usable_window(&rod), 0);
    }

    #[test]
    fn test_rcv_wnd_saturates() {
        let mut fc = FlowControlState::new(10);
        fc.consume_rcv_wnd(25);
        assert_eq!(fc.rcv_wnd, 0);
        fc.release_rcv_wnd(25);
        assert_eq!(fc.rcv_wnd, 25);
    }
}
