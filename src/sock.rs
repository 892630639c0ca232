//! Shared connection handle and its wait conditions.
//!
//! A [`TcpSock`] is referenced by the demux table, by its listener's queues
//! and by application threads. Its state sits behind one mutex; the four wait
//! conditions are condition variables paired with that mutex.
//!
//! Lock order: a child's lock is taken before its parent's.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::TcpConfig;
use crate::state::{TcpConnectionState, TcpState};
use crate::tcp_types::FourTuple;

/// A set of callers blocked on one condition of a connection.
///
/// Waking never blocks. Waiters must re-check their predicate after every
/// return from [`WaitQueue::wait`].
#[derive(Default)]
pub struct WaitQueue {
    cond: Condvar,
    wakeups: AtomicUsize,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wake(&self) {
        self.wakeups.fetch_add(1, Ordering::Relaxed);
        self.cond.notify_all();
    }

    pub fn wait(&self, guard: &mut MutexGuard<'_, TcpConnectionState>) {
        self.cond.wait(guard);
    }

    /// Number of wakeups delivered so far.
    pub fn wakeups(&self) -> usize {
        self.wakeups.load(Ordering::Relaxed)
    }
}

pub struct TcpSock {
    inner: Mutex<TcpConnectionState>,
    pub wait_connect: WaitQueue,
    pub wait_accept: WaitQueue,
    pub wait_send: WaitQueue,
    pub wait_recv: WaitQueue,
}

impl TcpSock {
    /// A fresh connection in CLOSED.
    pub fn new(config: &TcpConfig) -> Arc<Self> {
        Arc::new(Self::with_state(TcpConnectionState::new(config)))
    }

    /// A connection spawned by `parent` for an incoming SYN, already in
    /// SYN_RECV with `rcv_nxt` past the peer's SYN.
    pub(crate) fn new_child(
        config: &TcpConfig,
        parent: Weak<TcpSock>,
        tuple: FourTuple,
        rcv_nxt: u32,
        snd_wnd: u16,
    ) -> Arc<Self> {
        let mut st = TcpConnectionState::new(config);
        st.conn_mgmt.tuple = tuple;
        st.rod.rcv_nxt = rcv_nxt;
        st.flow_ctrl.snd_wnd = u32::from(snd_wnd);
        st.parent = Some(parent);
        st.set_state(TcpState::SynRecv);
        Arc::new(Self::with_state(st))
    }

    fn with_state(state: TcpConnectionState) -> Self {
        Self {
            inner: Mutex::new(state),
            wait_connect: WaitQueue::new(),
            wait_accept: WaitQueue::new(),
            wait_send: WaitQueue::new(),
            wait_recv: WaitQueue::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, TcpConnectionState> {
        self.inner.lock()
    }

    pub fn state(&self) -> TcpState {
        self.lock().state()
    }

    pub fn four_tuple(&self) -> FourTuple {
        self.lock().conn_mgmt.tuple
    }

    /// Wake every waiter, used when the connection is torn down.
    pub(crate) fn wake_all(&self) {
        self.wait_connect.wake();
        self.wait_accept.wake();
        self.wait_send.wake();
        self.wait_recv.wake();
    }
}
