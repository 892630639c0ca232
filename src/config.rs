//! Stack-wide tunables.

use std::time::Duration;

/// Parameters applied to every connection a stack allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConfig {
    /// Receive window a fresh connection advertises.
    pub rcv_wnd: u32,
    /// Largest payload carried by one outgoing data segment.
    pub mss: usize,
    /// Maximum segment lifetime; time-wait lasts twice this.
    pub msl: Duration,
    /// Default listener backlog (half-open plus unaccepted children).
    pub backlog: usize,
}

impl TcpConfig {
    pub const DEFAULT_RCV_WND: u32 = 65535;
    pub const DEFAULT_MSS: usize = 1460;
    pub const DEFAULT_MSL: Duration = Duration::from_secs(1);
    pub const DEFAULT_BACKLOG: usize = 128;

    pub fn timewait_timeout(&self) -> Duration {
        self.msl * 2
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            rcv_wnd: Self::DEFAULT_RCV_WND,
            mss: Self::DEFAULT_MSS,
            msl: Self::DEFAULT_MSL,
            backlog: Self::DEFAULT_BACKLOG,
        }
    }
}
