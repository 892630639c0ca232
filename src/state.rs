//! TCP Connection State
//!
//! This module provides the complete TCP connection state by aggregating
//! the disjoint state components from the components module.

use core::fmt;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};

pub use crate::components::{
    ConnectionManagementState,
    FlowControlState,
    ReliableOrderedDeliveryState,
};
use crate::config::TcpConfig;
use crate::sock::TcpSock;

/// TCP State Machine States
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynRecv,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    LastAck,
}

impl TcpState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TcpState::Closed => "CLOSED",
            TcpState::Listen => "LISTEN",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::Established => "ESTABLISHED",
            TcpState::FinWait1 => "FIN_WAIT_1",
            TcpState::FinWait2 => "FIN_WAIT_2",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
        }
    }

    /// States in which the peer may still deliver payload.
    pub fn peer_may_send(&self) -> bool {
        matches!(
            self,
            TcpState::SynSent
                | TcpState::SynRecv
                | TcpState::Established
                | TcpState::FinWait1
                | TcpState::FinWait2
        )
    }
}

impl fmt::Display for TcpState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete TCP Connection State
///
/// Aggregates the components plus the listener relationships. A child sits
/// in at most one of its parent's `listen_queue` / `accept_queue`.
pub struct TcpConnectionState {
    pub conn_mgmt: ConnectionManagementState,
    pub rod: ReliableOrderedDeliveryState,
    pub flow_ctrl: FlowControlState,

    /// Listener that spawned this connection.
    pub parent: Option<Weak<TcpSock>>,
    /// Children in SYN_RECV.
    pub listen_queue: VecDeque<Arc<TcpSock>>,
    /// Established children not yet accepted.
    pub accept_queue: VecDeque<Arc<TcpSock>>,
    pub backlog: usize,
}

impl TcpConnectionState {
    pub fn new(config: &TcpConfig) -> Self {
        Self {
            conn_mgmt: ConnectionManagementState::new(),
            rod: ReliableOrderedDeliveryState::new(),
            flow_ctrl: FlowControlState::new(config.rcv_wnd),
            parent: None,
            listen_queue: VecDeque::new(),
            accept_queue: VecDeque::new(),
            backlog: config.backlog,
        }
    }

    pub fn state(&self) -> TcpState {
        self.conn_mgmt.state()
    }

    pub fn set_state(&mut self, next: TcpState) {
        self.conn_mgmt.set_state(next)
    }

    /// Children held by a listener, half-open or waiting for accept.
    pub fn pending_children(&self) -> usize {
        self.listen_queue.len() + self.accept_queue.len()
    }

    pub fn parent(&self) -> Option<Arc<TcpSock>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }
}

/// Remove `child` from `queue`, returning whether it was present.
pub(crate) fn unlink(queue: &mut VecDeque<Arc<TcpSock>>, child: &Arc<TcpSock>) -> bool {
    let before = queue.len();
    queue.retain(|c| !Arc::ptr_eq(c, child));
    queue.len() != before
}
