//! Connection Management Component
//!
//! This component owns the TCP state machine and the connection identity.

use std::net::{Ipv4Addr, SocketAddrV4};

use log::debug;

use crate::error::{Result, TcpError};
use crate::state::TcpState;
use crate::tcp_types::FourTuple;

/// Connection Management State
///
/// Every state change goes through [`ConnectionManagementState::set_state`].
pub struct ConnectionManagementState {
    /* Connection Identifier (Tuple) */
    pub tuple: FourTuple,

    /* Lifecycle State */
    state: TcpState,
}

impl ConnectionManagementState {
    pub fn new() -> Self {
        Self {
            tuple: FourTuple::listening(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)),
            state: TcpState::Closed,
        }
    }

    pub fn state(&self) -> TcpState {
        self.state
    }

    pub fn set_state(&mut self, next: TcpState) {
        debug!("{}: {} -> {}", self.tuple, self.state, next);
        self.state = next;
    }

    // ------------------------------------------------------------------------
    // API-Initiated State Changes
    // ------------------------------------------------------------------------

    /// CLOSED → CLOSED: Bind to local address/port
    pub fn on_bind(&mut self, local: SocketAddrV4) -> Result<()> {
        self.expect_state("bind", TcpState::Closed)?;
        if local.port() == 0 {
            return Err(TcpError::PortUnspecified);
        }
        self.tuple = FourTuple::listening(local);
        Ok(())
    }

    /// CLOSED → LISTEN
    pub fn on_listen(&mut self) -> Result<()> {
        self.expect_state("listen", TcpState::Closed)?;
        if self.tuple.local_port == 0 {
            return Err(TcpError::PortUnspecified);
        }
        self.set_state(TcpState::Listen);
        Ok(())
    }

    /// CLOSED → SYN_SENT: Store remote endpoint
    pub fn on_connect(&mut self, remote: SocketAddrV4) -> Result<()> {
        self.expect_state("connect", TcpState::Closed)?;
        if self.tuple.local_port == 0 {
            return Err(TcpError::PortUnspecified);
        }
        self.tuple = FourTuple::new(self.tuple.local(), remote);
        self.set_state(TcpState::SynSent);
        Ok(())
    }

    fn expect_state(&self, op: &'static str, expected: TcpState) -> Result<()> {
        if self.state != expected {
            return Err(TcpError::InvalidState { op, state: self.state });
        }
        Ok(())
    }
}

impl Default for ConnectionManagementState {
    fn default() -> Self {
        Self::new()
    }
}
