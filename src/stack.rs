//! The object the input path and the socket calls run on.
//!
//! A stack carries the configuration and the injected collaborators: the
//! demux table, the transmit sink and the time-wait timer.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace};

use crate::config::TcpConfig;
use crate::sock::TcpSock;
use crate::state::{unlink, TcpConnectionState, TcpState};
use crate::tcp_hash::{SockHashTable, SockTable};
use crate::tcp_out::Transmit;
use crate::tcp_timer::{TimeWaitList, TimeWaitTimer};
use crate::tcp_types::TcpSegment;

pub struct TcpStack {
    pub(crate) config: TcpConfig,
    pub(crate) table: Arc<dyn SockTable>,
    pub(crate) tx: Arc<dyn Transmit>,
    pub(crate) timer: Arc<dyn TimeWaitTimer>,
}

impl TcpStack {
    pub fn new(
        config: TcpConfig,
        table: Arc<dyn SockTable>,
        tx: Arc<dyn Transmit>,
        timer: Arc<dyn TimeWaitTimer>,
    ) -> Self {
        Self { config, table, tx, timer }
    }

    /// A stack over the in-memory table and time-wait list.
    pub fn with_defaults(config: TcpConfig, tx: Arc<dyn Transmit>) -> Self {
        let table = Arc::new(SockHashTable::new());
        let timer = Arc::new(TimeWaitList::new(config.timewait_timeout()));
        Self::new(config, table, tx, timer)
    }

    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Allocate a connection in CLOSED.
    pub fn socket(&self) -> Arc<TcpSock> {
        TcpSock::new(&self.config)
    }

    /// Demultiplex `seg` and run it through the input path. A segment no
    /// connection claims is answered the way CLOSED answers it, so a stray
    /// RST is dropped rather than reset.
    pub fn input(&self, seg: &TcpSegment) {
        match self.table.lookup(seg) {
            Some(sock) => self.process(&sock, seg),
            None => {
                debug!("no connection for {}", seg.four_tuple());
                self.state_closed(seg);
            }
        }
    }

    /// Close every connection whose time-wait elapsed by `now`.
    pub fn expire_timers(&self, now: Instant) {
        for sock in self.timer.take_expired(now) {
            let mut st = sock.lock();
            if st.state() != TcpState::Closed {
                self.teardown(&sock, &mut st);
            }
        }
    }

    /// Terminal close: unhash first, then leave the parent's queues and wake
    /// every waiter. The owner frees the socket once the last handle drops.
    pub(crate) fn teardown(&self, sock: &Arc<TcpSock>, st: &mut TcpConnectionState) {
        st.set_state(TcpState::Closed);
        if !self.table.unhash(sock, &st.conn_mgmt.tuple) {
            trace!("{}: was not hashed", st.conn_mgmt.tuple);
        }
        if let Some(parent) = st.parent() {
            let mut pst = parent.lock();
            unlink(&mut pst.listen_queue, sock);
            unlink(&mut pst.accept_queue, sock);
        }
        sock.wake_all();
    }
}
