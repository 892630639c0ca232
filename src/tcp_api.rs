//! TCP API Functions
//!
//! Application-facing calls: bind, listen, connect, accept, read, write and
//! close. They block only on a connection's wait conditions, never on the
//! input path, and every wait re-checks its condition under the lock.

use std::mem;
use std::net::SocketAddrV4;
use std::sync::Arc;

use log::{debug, info};

use crate::error::{Result, TcpError};
use crate::sock::TcpSock;
use crate::stack::TcpStack;
use crate::state::TcpState;
use crate::tcp_out::TcpTx;
use crate::tcp_proto::TcpFlags;

impl TcpStack {
    /// Bind to a local address.
    ///
    /// Transition: CLOSED -> CLOSED (with address assigned)
    pub fn bind(&self, sock: &Arc<TcpSock>, local: SocketAddrV4) -> Result<()> {
        sock.lock().conn_mgmt.on_bind(local)
    }

    /// Start listening for connections, keeping at most `backlog` children.
    ///
    /// Transition: CLOSED -> LISTEN
    pub fn listen(&self, sock: &Arc<TcpSock>, backlog: usize) -> Result<()> {
        let mut st = sock.lock();
        st.conn_mgmt.on_listen()?;
        st.backlog = backlog;
        let tuple = st.conn_mgmt.tuple;
        if let Err(err) = self.table.hash(sock, tuple) {
            st.set_state(TcpState::Closed);
            return Err(err);
        }
        info!("{}: listening, backlog {}", tuple, backlog);
        Ok(())
    }

    /// Active open. Blocks until the handshake completes or is refused.
    ///
    /// Transition: CLOSED -> SYN_SENT -> ESTABLISHED
    pub fn connect(&self, sock: &Arc<TcpSock>, remote: SocketAddrV4) -> Result<()> {
        let mut st = sock.lock();
        st.conn_mgmt.on_connect(remote)?;
        let tuple = st.conn_mgmt.tuple;
        if let Err(err) = self.table.hash(sock, tuple) {
            st.set_state(TcpState::Closed);
            return Err(err);
        }
        TcpTx::send_control_packet(self.tx.as_ref(), &mut st, TcpFlags::SYN);

        while st.state() == TcpState::SynSent {
            sock.wait_connect.wait(&mut st);
        }
        match st.state() {
            TcpState::Closed => Err(TcpError::ConnectionRefused),
            _ => Ok(()),
        }
    }

    /// Take the oldest established child, blocking until one arrives.
    pub fn accept(&self, listener: &Arc<TcpSock>) -> Result<Arc<TcpSock>> {
        let mut st = listener.lock();
        loop {
            if st.state() != TcpState::Listen {
                return Err(TcpError::NotListening);
            }
            if let Some(child) = st.accept_queue.pop_front() {
                debug!("{}: accepted a connection", st.conn_mgmt.tuple);
                return Ok(child);
            }
            listener.wait_accept.wait(&mut st);
        }
    }

    /// Read buffered payload into `buf`. Returns `Ok(0)` once the peer's FIN
    /// was received and the buffer is drained, `ConnectionReset` when the
    /// peer reset the connection instead.
    pub fn read(&self, sock: &Arc<TcpSock>, buf: &mut [u8]) -> Result<usize> {
        let mut st = sock.lock();
        loop {
            if !st.rod.rcv_buf.is_empty() {
                let n = st.rod.rcv_buf.read(buf);
                st.flow_ctrl.release_rcv_wnd(n as u32);
                return Ok(n);
            }
            if st.rod.reset_received {
                return Err(TcpError::ConnectionReset);
            }
            if st.rod.fin_received || !st.state().peer_may_send() {
                return Ok(0);
            }
            sock.wait_recv.wait(&mut st);
        }
    }

    /// Send `data`, blocking while everything the peer's window allows is
    /// already in flight.
    pub fn write(&self, sock: &Arc<TcpSock>, data: &[u8]) -> Result<usize> {
        let mut st = sock.lock();
        if !matches!(st.state(), TcpState::Established | TcpState::CloseWait) {
            return Err(TcpError::NotConnected);
        }

        let mut sent = 0;
        while sent < data.len() {
            match st.state() {
                TcpState::Established | TcpState::CloseWait => {}
                TcpState::Closed => return Err(TcpError::ConnectionReset),
                _ => return Err(TcpError::NotConnected),
            }
            let usable = st.flow_ctrl.usable_window(&st.rod) as usize;
            if usable == 0 {
                sock.wait_send.wait(&mut st);
                continue;
            }

            let len = (data.len() - sent).min(self.config.mss.max(1)).min(usable);
            TcpTx::send_data_packet(self.tx.as_ref(), &mut st, &data[sent..sent + len]);
            sent += len;
        }
        Ok(sent)
    }

    /// Start or finish the close of a connection.
    ///
    /// A listener resets and drops every child it still holds.
    pub fn close(&self, sock: &Arc<TcpSock>) -> Result<()> {
        let mut st = sock.lock();
        match st.state() {
            TcpState::Established => {
                TcpTx::send_control_packet(self.tx.as_ref(), &mut st, TcpFlags::FIN | TcpFlags::ACK);
                st.set_state(TcpState::FinWait1);
            }
            TcpState::CloseWait => {
                TcpTx::send_control_packet(self.tx.as_ref(), &mut st, TcpFlags::FIN | TcpFlags::ACK);
                st.set_state(TcpState::LastAck);
            }
            TcpState::Listen => {
                let mut children = mem::take(&mut st.listen_queue);
                children.append(&mut st.accept_queue);
                self.teardown(sock, &mut st);
                drop(st);

                // Child locks come before the parent's, so only now.
                for child in children {
                    let mut cst = child.lock();
                    if cst.state() == TcpState::Closed {
                        continue;
                    }
                    TcpTx::send_control_packet(self.tx.as_ref(), &mut cst, TcpFlags::RST | TcpFlags::ACK);
                    self.teardown(&child, &mut cst);
                }
            }
            TcpState::SynSent | TcpState::SynRecv => self.teardown(sock, &mut st),
            _ => {}
        }
        Ok(())
    }
}
