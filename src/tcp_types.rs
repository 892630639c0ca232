//! TCP Common Types
//!
//! Shared types used across TCP implementation modules.

use core::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::tcp_proto::TcpFlags;

/// Connection identifier.
///
/// A listening connection carries the wildcard remote (`0.0.0.0:0`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FourTuple {
    pub local_ip: Ipv4Addr,
    pub local_port: u16,
    pub remote_ip: Ipv4Addr,
    pub remote_port: u16,
}

impl FourTuple {
    pub fn new(local: SocketAddrV4, remote: SocketAddrV4) -> Self {
        Self {
            local_ip: *local.ip(),
            local_port: local.port(),
            remote_ip: *remote.ip(),
            remote_port: remote.port(),
        }
    }

    /// Tuple under which a listener on `local` is registered.
    pub fn listening(local: SocketAddrV4) -> Self {
        Self::new(local, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
    }

    pub fn local(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.local_ip, self.local_port)
    }

    pub fn remote(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.remote_ip, self.remote_port)
    }

    /// The same connection seen from the other end.
    pub fn reversed(&self) -> Self {
        Self::new(self.remote(), self.local())
    }
}

impl fmt::Display for FourTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.local(), self.remote())
    }
}

/// Parsed TCP segment information
///
/// Built once by the packet parser and consumed by the input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpSegment {
    pub src: SocketAddrV4,
    pub dst: SocketAddrV4,
    pub flags: TcpFlags,
    pub seq: u32,
    /// One past the last sequence number the segment occupies. SYN and FIN
    /// each occupy one.
    pub seq_end: u32,
    pub ack: u32,
    pub rwnd: u16,
    pub payload: Vec<u8>,
}

impl TcpSegment {
    pub fn new(
        src: SocketAddrV4,
        dst: SocketAddrV4,
        flags: TcpFlags,
        seq: u32,
        ack: u32,
        rwnd: u16,
        payload: &[u8],
    ) -> Self {
        let mut len = payload.len() as u32;
        if flags.is_syn() {
            len += 1;
        }
        if flags.is_fin() {
            len += 1;
        }
        Self {
            src,
            dst,
            flags,
            seq,
            seq_end: seq.wrapping_add(len),
            ack,
            rwnd,
            payload: payload.to_vec(),
        }
    }

    pub fn pl_len(&self) -> u32 {
        self.payload.len() as u32
    }

    /// The tuple of the connection this segment is addressed to.
    pub fn four_tuple(&self) -> FourTuple {
        FourTuple::new(self.dst, self.src)
    }
}

/// Outcome of one phase of the input pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The segment is fully handled; later phases must not run.
    Done,
    /// Hand the segment to the next phase.
    Continue,
}
