//! TCP error type returned by the demux table and the socket calls.
//!
//! The input path never returns errors; it answers on the wire or drops.

use thiserror::Error;

use crate::state::TcpState;
use crate::tcp_types::FourTuple;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TcpError {
    #[error("a connection for {0} is already registered")]
    AlreadyExists(FourTuple),

    #[error("{op} is not permitted in state {state}")]
    InvalidState { op: &'static str, state: TcpState },

    #[error("port 0 is not supported, provide an explicit port")]
    PortUnspecified,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("socket is not connected")]
    NotConnected,

    #[error("socket is not listening")]
    NotListening,
}

pub type Result<T> = core::result::Result<T, TcpError>;
