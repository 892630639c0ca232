//! Time-wait bookkeeping.
//!
//! A connection that acknowledged the peer's FIN in FIN_WAIT_2 lingers for
//! 2·MSL so late duplicates of that FIN are still answered, then the stack
//! closes it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::sock::TcpSock;

pub trait TimeWaitTimer: Send + Sync {
    /// Schedule terminal cleanup of `sock`. Arming an already armed socket
    /// restarts its timer.
    fn set_timewait_timer(&self, sock: &Arc<TcpSock>);

    /// Hand back every socket whose timer has elapsed at `now`.
    fn take_expired(&self, _now: Instant) -> Vec<Arc<TcpSock>> {
        Vec::new()
    }
}

struct TimeWaitEntry {
    sock: Arc<TcpSock>,
    deadline: Instant,
}

pub struct TimeWaitList {
    timeout: Duration,
    entries: Mutex<Vec<TimeWaitEntry>>,
}

impl TimeWaitList {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, entries: Mutex::new(Vec::new()) }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn arm_at(&self, sock: &Arc<TcpSock>, now: Instant) {
        let deadline = now + self.timeout;
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|e| Arc::ptr_eq(&e.sock, sock)) {
            Some(entry) => entry.deadline = deadline,
            None => entries.push(TimeWaitEntry { sock: Arc::clone(sock), deadline }),
        }
    }
}

impl TimeWaitTimer for TimeWaitList {
    fn set_timewait_timer(&self, sock: &Arc<TcpSock>) {
        self.arm_at(sock, Instant::now());
    }

    fn take_expired(&self, now: Instant) -> Vec<Arc<TcpSock>> {
        let mut entries = self.entries.lock();
        let mut expired = Vec::new();
        entries.retain(|e| {
            if e.deadline <= now {
                expired.push(Arc::clone(&e.sock));
                false
            } else {
                true
            }
        });
        expired
    }
}
