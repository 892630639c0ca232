//! TCP State Components
//!
//! The connection state is split into disjoint components:
//! 1. Connection Management - TCP state machine and connection identity
//! 2. Reliable Ordered Delivery - Sequence numbers and the receive buffer
//! 3. Flow Control - Receive and send windows

mod connection_mgmt;
mod flow_control;
mod rod;

pub use connection_mgmt::ConnectionManagementState;
pub use flow_control::FlowControlState;
pub use rod::ReliableOrderedDeliveryState;
