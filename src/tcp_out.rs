//! TCP Packet Transmission (TX Path)
//!
//! Builds outgoing segments from connection state and hands them to a
//! [`Transmit`] sink, which owns framing, checksums and the wire.

use log::trace;

use crate::state::TcpConnectionState;
use crate::tcp_proto::{TcpFlags, TCP_MAX_WINDOW};
use crate::tcp_types::{FourTuple, TcpSegment};

/// A segment ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutSegment {
    /// Sender's view: `local` is the source.
    pub tuple: FourTuple,
    pub flags: TcpFlags,
    pub seq: u32,
    pub ack: u32,
    pub rwnd: u16,
    pub payload: Vec<u8>,
}

impl OutSegment {
    /// The segment as the receiving end parses it.
    pub fn to_incoming(&self) -> TcpSegment {
        TcpSegment::new(
            self.tuple.local(),
            self.tuple.remote(),
            self.flags,
            self.seq,
            self.ack,
            self.rwnd,
            &self.payload,
        )
    }
}

/// Outgoing segment sink.
pub trait Transmit: Send + Sync {
    fn transmit(&self, seg: OutSegment);
}

/// TCP TX Path
pub struct TcpTx;

impl TcpTx {
    /// Send a zero-payload segment carrying `flags`.
    ///
    /// seq is `snd_nxt`, ack is `rcv_nxt`. SYN and FIN each consume one
    /// sequence number.
    pub fn send_control_packet(tx: &dyn Transmit, state: &mut TcpConnectionState, flags: TcpFlags) {
        Self::send_segment(tx, state, flags, &[]);
        if flags.intersects(TcpFlags::SYN | TcpFlags::FIN) {
            state.rod.snd_nxt = state.rod.snd_nxt.wrapping_add(1);
        }
    }

    /// Send `data` with ACK set, advancing `snd_nxt` past it.
    pub fn send_data_packet(tx: &dyn Transmit, state: &mut TcpConnectionState, data: &[u8]) {
        Self::send_segment(tx, state, TcpFlags::ACK | TcpFlags::PSH, data);
        state.rod.snd_nxt = state.rod.snd_nxt.wrapping_add(data.len() as u32);
    }

    /// Answer `seg` with a RST without any connection context.
    ///
    /// If `seg` carried an ACK the reset takes its ack as sequence number,
    /// otherwise it starts at 0 and acknowledges everything `seg` occupied.
    pub fn send_reset(tx: &dyn Transmit, seg: &TcpSegment) {
        let (flags, seq, ack) = if seg.flags.is_ack() {
            (TcpFlags::RST, seg.ack, 0)
        } else {
            (TcpFlags::RST | TcpFlags::ACK, 0, seg.seq_end)
        };
        let out = OutSegment {
            tuple: FourTuple::new(seg.dst, seg.src),
            flags,
            seq,
            ack,
            rwnd: 0,
            payload: Vec::new(),
        };
        trace!("{}: send {} seq={} ack={}", out.tuple, out.flags, out.seq, out.ack);
        tx.transmit(out);
    }

    fn send_segment(tx: &dyn Transmit, state: &TcpConnectionState, flags: TcpFlags, data: &[u8]) {
        let out = OutSegment {
            tuple: state.conn_mgmt.tuple,
            flags,
            seq: state.rod.snd_nxt,
            ack: state.rod.rcv_nxt,
            rwnd: state.flow_ctrl.rcv_wnd.min(TCP_MAX_WINDOW) as u16,
            payload: data.to_vec(),
        };
        trace!(
            "{}: send {} seq={} ack={} len={}",
            out.tuple,
            out.flags,
            out.seq,
            out.ack,
            data.len()
        );
        tx.transmit(out);
    }
}
