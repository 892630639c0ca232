//! Rust implementation of a TCP connection state machine
//!
//! The crate interprets incoming segments for already demultiplexed
//! connections: passive and active open, in-order data delivery with
//! receive/send window accounting, and the close sequences. Framing, routing
//! and retransmission live outside; segments leave through a [`Transmit`]
//! sink and connections are indexed by an injected [`SockTable`].

pub mod components;
pub mod config;
pub mod error;
pub mod ring_buffer;
pub mod sock;
pub mod stack;
pub mod state;
pub mod tcp_api;
pub mod tcp_hash;
pub mod tcp_in;
pub mod tcp_out;
pub mod tcp_proto;
pub mod tcp_timer;
pub mod tcp_types;

pub use config::TcpConfig;
pub use error::{Result, TcpError};
pub use sock::{TcpSock, WaitQueue};
pub use stack::TcpStack;
pub use state::{TcpConnectionState, TcpState};
pub use tcp_hash::{SockHashTable, SockTable};
pub use tcp_out::{OutSegment, TcpTx, Transmit};
pub use tcp_proto::TcpFlags;
pub use tcp_timer::{TimeWaitList, TimeWaitTimer};
pub use tcp_types::{Disposition, FourTuple, TcpSegment};
