//! Reliable Ordered Delivery Component
//!
//! Sequence numbers and the receive buffer.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::ring_buffer::RingBuffer;
use crate::tcp_proto::{seq_gt, seq_lt};
use crate::tcp_types::TcpSegment;

/// Reliable Ordered Delivery State
pub struct ReliableOrderedDeliveryState {
    /* Local & Remote Sequence Numbers */
    pub iss: u32,          // Our initial send sequence number
    pub snd_una: u32,      // Oldest unacknowledged sequence number
    pub snd_nxt: u32,      // Next sequence number we will send
    pub rcv_nxt: u32,      // Next sequence number we expect from peer

    /* Receive Buffer */
    pub rcv_buf: RingBuffer,

    /* End of Stream */
    pub fin_received: bool,    // Peer's FIN accepted, nothing more will arrive
    pub reset_received: bool,  // Connection was torn down by the peer's RST
}

impl ReliableOrderedDeliveryState {
    pub fn new() -> Self {
        let iss = Self::generate_iss();
        Self {
            iss,
            snd_una: iss,
            snd_nxt: iss,
            rcv_nxt: 0,
            rcv_buf: RingBuffer::new(),
            fin_received: false,
            reset_received: false,
        }
    }

    /// Generate Initial Sequence Number (ISS)
    ///
    /// RFC 793 clock: the low 32 bits of a counter ticking every 4 µs.
    pub fn generate_iss() -> u32 {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros();
        (micros / 4) as u32
    }

    /// Advance `rcv_nxt` to `seq_end` of an accepted segment. Never moves it
    /// backwards.
    pub fn advance_rcv_nxt(&mut self, seq_end: u32) {
        if seq_gt(seq_end, self.rcv_nxt) {
            self.rcv_nxt = seq_end;
        }
    }

    /// True when the segment starts past `rcv_nxt`, leaving a gap.
    pub fn is_out_of_order(&self, seg: &TcpSegment) -> bool {
        seq_gt(seg.seq, self.rcv_nxt)
    }

    /// The part of the payload not received yet, i.e. everything from
    /// `rcv_nxt` on.
    ///
    /// Callers must have rejected out-of-order segments already.
    fn fresh_payload<'a>(&self, seg: &'a TcpSegment) -> &'a [u8] {
        let skip = if seq_lt(seg.seq, self.rcv_nxt) {
            self.rcv_nxt.wrapping_sub(seg.seq) as usize
        } else {
            0
        };
        seg.payload.get(skip..).unwrap_or(&[])
    }

    /// Append the fresh part of the payload to the receive buffer. Returns
    /// the number of bytes appended.
    pub fn recv_data(&mut self, seg: &TcpSegment) -> usize {
        let fresh = self.fresh_payload(seg);
        self.rcv_buf.write(fresh);
        fresh.len()
    }
}

impl Default for ReliableOrderedDeliveryState {
    fn default() -> Self {
        Self::new()
    }
}
