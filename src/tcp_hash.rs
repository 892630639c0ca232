//! Demultiplexing table keyed by 4-tuple.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Result, TcpError};
use crate::sock::TcpSock;
use crate::tcp_types::{FourTuple, TcpSegment};

/// Index of live connections, injected into the stack.
///
/// Implementations must be internally synchronized and must not take a
/// connection lock while holding their own.
pub trait SockTable: Send + Sync {
    fn hash(&self, sock: &Arc<TcpSock>, tuple: FourTuple) -> Result<()>;

    /// Remove `sock` from under `tuple`. Returns false when `tuple` does not
    /// map to `sock`, e.g. on a second call.
    fn unhash(&self, sock: &Arc<TcpSock>, tuple: &FourTuple) -> bool;

    /// Find the connection an incoming segment is addressed to.
    fn lookup(&self, seg: &TcpSegment) -> Option<Arc<TcpSock>>;
}

/// The default in-memory table.
#[derive(Default)]
pub struct SockHashTable {
    socks: RwLock<HashMap<FourTuple, Arc<TcpSock>>>,
}

impl SockHashTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.socks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.socks.read().is_empty()
    }

    pub fn contains(&self, tuple: &FourTuple) -> bool {
        self.socks.read().contains_key(tuple)
    }
}

impl SockTable for SockHashTable {
    fn hash(&self, sock: &Arc<TcpSock>, tuple: FourTuple) -> Result<()> {
        let mut socks = self.socks.write();
        if socks.contains_key(&tuple) {
            return Err(TcpError::AlreadyExists(tuple));
        }
        socks.insert(tuple, Arc::clone(sock));
        Ok(())
    }

    fn unhash(&self, sock: &Arc<TcpSock>, tuple: &FourTuple) -> bool {
        let mut socks = self.socks.write();
        match socks.get(tuple) {
            Some(found) if Arc::ptr_eq(found, sock) => {
                socks.remove(tuple);
                true
            }
            _ => false,
        }
    }

    /// Exact match first, then a listener on the destination address, then
    /// a listener on the wildcard address.
    fn lookup(&self, seg: &TcpSegment) -> Option<Arc<TcpSock>> {
        let socks = self.socks.read();
        let candidates = [
            seg.four_tuple(),
            FourTuple::listening(seg.dst),
            FourTuple::listening(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, seg.dst.port())),
        ];
        candidates.iter().find_map(|tuple| socks.get(tuple).cloned())
    }
}
