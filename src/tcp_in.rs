//! TCP Packet Reception (RX Path)
//!
//! Interprets an incoming segment against the state of the connection it was
//! demultiplexed to. CLOSED, LISTEN and SYN_SENT are handled directly; every
//! other state runs the shared pipeline:
//!
//! 1. sequence check against the receive window, drop on failure;
//! 2. RST tears the connection down;
//! 3. SYN on a synchronized connection is a violation, tear down;
//! 4. segments with neither ACK nor FIN are dropped;
//! 5. state-specific ack handling (SYN_RECV, FIN_WAIT_1, FIN_WAIT_2, LAST_ACK);
//! 6. receive window accounting;
//! 7. send window update;
//! 8. payload delivery;
//! 9. FIN: passive close straight through CLOSE_WAIT to LAST_ACK;
//! 10. acknowledge anything that was not a bare ACK.
//!
//! Steps 1-4 and 5 return a [`Disposition`]; only `Continue` reaches the next.

use std::sync::Arc;

use log::{debug, error, trace, warn};

use crate::sock::TcpSock;
use crate::stack::TcpStack;
use crate::state::{unlink, TcpConnectionState, TcpState};
use crate::tcp_out::TcpTx;
use crate::tcp_proto::TcpFlags;
use crate::tcp_types::{Disposition, TcpSegment};

impl TcpStack {
    /// Process one segment for `sock`.
    ///
    /// Runs to completion under the connection's lock and never blocks on
    /// application callers.
    pub fn process(&self, sock: &Arc<TcpSock>, seg: &TcpSegment) {
        let mut st = sock.lock();
        debug!(
            "{}: received {} seq={} ack={} len={} in {}",
            st.conn_mgmt.tuple,
            seg.flags,
            seg.seq,
            seg.ack,
            seg.pl_len(),
            st.state()
        );

        match st.state() {
            TcpState::Closed => return self.state_closed(seg),
            TcpState::Listen => return self.state_listen(sock, &mut st, seg),
            TcpState::SynSent => return self.state_syn_sent(sock, &mut st, seg),
            _ => {}
        }

        if self.check_segment(sock, &mut st, seg) == Disposition::Done {
            return;
        }
        if self.process_ack(sock, &mut st, seg) == Disposition::Done {
            return;
        }
        self.process_payload(sock, &mut st, seg);
    }

    /// Reset whatever reaches a closed or unknown connection, except a RST:
    /// answering one would bounce resets between two such ends forever.
    pub(crate) fn state_closed(&self, seg: &TcpSegment) {
        if seg.flags.is_rst() {
            trace!("{}: drop RST for closed connection", seg.four_tuple());
            return;
        }
        TcpTx::send_reset(self.tx.as_ref(), seg);
    }

    /// Spawn a child for an incoming SYN.
    ///
    /// The child is registered before the SYN+ACK leaves, so a failed
    /// registration is answered with RST and no half-open state is left
    /// behind on either side.
    fn state_listen(&self, listener: &Arc<TcpSock>, st: &mut TcpConnectionState, seg: &TcpSegment) {
        if seg.flags.is_rst() {
            trace!("{}: ignore RST while listening", st.conn_mgmt.tuple);
            return;
        }
        if seg.flags.is_ack() {
            TcpTx::send_reset(self.tx.as_ref(), seg);
            return;
        }
        if !seg.flags.is_syn() {
            debug!("{}: received {} while listening, drop it", st.conn_mgmt.tuple, seg.flags);
            return;
        }
        if st.pending_children() >= st.backlog {
            warn!("{}: backlog of {} full, drop SYN", st.conn_mgmt.tuple, st.backlog);
            return;
        }

        let child = TcpSock::new_child(
            &self.config,
            Arc::downgrade(listener),
            seg.four_tuple(),
            seg.seq_end,
            seg.rwnd,
        );
        // Not yet reachable by anyone else, so taking the child's lock under
        // the listener's cannot deadlock.
        let mut cst = child.lock();
        let tuple = cst.conn_mgmt.tuple;
        if let Err(err) = self.table.hash(&child, tuple) {
            error!("{}: insert into established table failed: {}", tuple, err);
            TcpTx::send_reset(self.tx.as_ref(), seg);
            return;
        }
        st.listen_queue.push_back(Arc::clone(&child));
        TcpTx::send_control_packet(self.tx.as_ref(), &mut cst, TcpFlags::SYN | TcpFlags::ACK);
    }

    /// Anything but an acceptable SYN+ACK abandons the active open.
    fn state_syn_sent(&self, sock: &Arc<TcpSock>, st: &mut TcpConnectionState, seg: &TcpSegment) {
        let acks_syn = seg.ack == st.rod.snd_nxt;
        if seg.flags != (TcpFlags::SYN | TcpFlags::ACK) || !acks_syn {
            warn!("{}: unexpected {} in SYN_SENT, reset", st.conn_mgmt.tuple, seg.flags);
            TcpTx::send_reset(self.tx.as_ref(), seg);
            self.teardown(sock, st);
            return;
        }

        st.rod.rcv_nxt = seg.seq_end;
        st.flow_ctrl.update_window_safe(&mut st.rod, seg);
        TcpTx::send_control_packet(self.tx.as_ref(), st, TcpFlags::ACK);
        st.set_state(TcpState::Established);
        sock.wait_connect.wake();
    }

    /// Steps 1-4.
    fn check_segment(
        &self,
        sock: &Arc<TcpSock>,
        st: &mut TcpConnectionState,
        seg: &TcpSegment,
    ) -> Disposition {
        if !st.flow_ctrl.is_seq_valid(&st.rod, seg) {
            warn!(
                "{}: received packet with invalid seq [{}, {}), rcv_nxt={} rcv_wnd={}, drop it",
                st.conn_mgmt.tuple,
                seg.seq,
                seg.seq_end,
                st.rod.rcv_nxt,
                st.flow_ctrl.rcv_wnd
            );
            return Disposition::Done;
        }

        if seg.flags.is_rst() {
            debug!("{}: connection reset by peer", st.conn_mgmt.tuple);
            st.rod.reset_received = true;
            self.teardown(sock, st);
            return Disposition::Done;
        }

        if seg.flags.is_syn() {
            warn!("{}: SYN on a synchronized connection, reset", st.conn_mgmt.tuple);
            TcpTx::send_reset(self.tx.as_ref(), seg);
            self.teardown(sock, st);
            return Disposition::Done;
        }

        if !seg.flags.is_ack() && !seg.flags.is_fin() {
            warn!("{}: received packet without ack, drop it", st.conn_mgmt.tuple);
            return Disposition::Done;
        }

        Disposition::Continue
    }

    /// Step 5. An ACK counts for SYN_RECV, FIN_WAIT_1 and LAST_ACK only when
    /// it acknowledges everything sent so far (our SYN or FIN).
    fn process_ack(
        &self,
        sock: &Arc<TcpSock>,
        st: &mut TcpConnectionState,
        seg: &TcpSegment,
    ) -> Disposition {
        let acks_all = seg.flags.is_ack() && seg.ack == st.rod.snd_nxt;
        match st.state() {
            TcpState::SynRecv => {
                if acks_all {
                    self.state_syn_recv(sock, st, seg);
                } else {
                    debug!("{}: ack {} does not cover our SYN, drop it", st.conn_mgmt.tuple, seg.ack);
                }
                Disposition::Done
            }
            TcpState::FinWait1 => {
                if acks_all {
                    st.flow_ctrl.update_window_safe(&mut st.rod, seg);
                    st.set_state(TcpState::FinWait2);
                } else {
                    debug!("{}: ack {} does not cover our FIN, drop it", st.conn_mgmt.tuple, seg.ack);
                }
                Disposition::Done
            }
            TcpState::FinWait2 => {
                self.state_fin_wait_2(sock, st, seg);
                Disposition::Done
            }
            TcpState::LastAck => {
                if acks_all {
                    self.teardown(sock, st);
                } else {
                    debug!("{}: ack {} does not cover our FIN, drop it", st.conn_mgmt.tuple, seg.ack);
                }
                Disposition::Done
            }
            _ => Disposition::Continue,
        }
    }

    /// Handshake completed: move from the listener's listen queue to its
    /// accept queue and wake an `accept` caller.
    fn state_syn_recv(&self, sock: &Arc<TcpSock>, st: &mut TcpConnectionState, seg: &TcpSegment) {
        let Some(parent) = st.parent() else {
            warn!("{}: listener is gone, reset", st.conn_mgmt.tuple);
            TcpTx::send_reset(self.tx.as_ref(), seg);
            self.teardown(sock, st);
            return;
        };

        let mut pst = parent.lock();
        if pst.state() != TcpState::Listen {
            drop(pst);
            warn!("{}: listener closed, reset", st.conn_mgmt.tuple);
            TcpTx::send_reset(self.tx.as_ref(), seg);
            self.teardown(sock, st);
            return;
        }

        st.flow_ctrl.update_window_safe(&mut st.rod, seg);
        unlink(&mut pst.listen_queue, sock);
        pst.accept_queue.push_back(Arc::clone(sock));
        st.set_state(TcpState::Established);
        parent.wait_accept.wake();
    }

    /// Only the peer's FIN+ACK is of interest once our FIN is acknowledged.
    fn state_fin_wait_2(&self, sock: &Arc<TcpSock>, st: &mut TcpConnectionState, seg: &TcpSegment) {
        if seg.flags != (TcpFlags::FIN | TcpFlags::ACK) {
            debug!("{}: received {} in FIN_WAIT_2, drop it", st.conn_mgmt.tuple, seg.flags);
            return;
        }
        if st.rod.is_out_of_order(seg) {
            TcpTx::send_control_packet(self.tx.as_ref(), st, TcpFlags::ACK);
            return;
        }

        st.rod.advance_rcv_nxt(seg.seq_end);
        st.rod.fin_received = true;
        TcpTx::send_control_packet(self.tx.as_ref(), st, TcpFlags::ACK);
        self.timer.set_timewait_timer(sock);
        sock.wait_recv.wake();
    }

    /// Steps 6-10, reached by ESTABLISHED only.
    fn process_payload(&self, sock: &Arc<TcpSock>, st: &mut TcpConnectionState, seg: &TcpSegment) {
        let bare_ack = seg.flags == TcpFlags::ACK && seg.payload.is_empty();
        let in_order = !st.rod.is_out_of_order(seg);
        let accepted = if in_order { st.rod.recv_data(seg) } else { 0 };

        st.flow_ctrl.consume_rcv_wnd(accepted as u32);

        if st.flow_ctrl.update_window_safe(&mut st.rod, seg) {
            sock.wait_send.wake();
        }

        if accepted > 0 {
            sock.wait_recv.wake();
        }

        if !in_order {
            // No reassembly: ask for the gap again.
            debug!(
                "{}: segment at {} beyond rcv_nxt {}, ack again",
                st.conn_mgmt.tuple,
                seg.seq,
                st.rod.rcv_nxt
            );
            if !bare_ack {
                TcpTx::send_control_packet(self.tx.as_ref(), st, TcpFlags::ACK);
            }
            return;
        }

        if seg.flags.is_fin() {
            st.set_state(TcpState::CloseWait);
            st.rod.advance_rcv_nxt(seg.seq_end);
            st.rod.fin_received = true;
            TcpTx::send_control_packet(self.tx.as_ref(), st, TcpFlags::ACK);
            TcpTx::send_control_packet(self.tx.as_ref(), st, TcpFlags::FIN | TcpFlags::ACK);
            st.set_state(TcpState::LastAck);
            sock.wait_recv.wake();
            return;
        }

        if !bare_ack {
            st.rod.advance_rcv_nxt(seg.seq_end);
            TcpTx::send_control_packet(self.tx.as_ref(), st, TcpFlags::ACK);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TcpConfig;
    use crate::tcp_hash::{SockHashTable, SockTable};
    use crate::tcp_out::{OutSegment, Transmit};
    use crate::tcp_timer::TimeWaitList;
    use parking_lot::Mutex;
    use std::net::{Ipv4Addr, SocketAddrV4};
    use std::time::Duration;

    #[derive(Default)]
    struct Capture(Mutex<Vec<OutSegment>>);

    impl Transmit for Capture {
        fn transmit(&self, seg: OutSegment) {
            self.0.lock().push(seg);
        }
    }

    fn local() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 80)
    }

    fn remote() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 40000)
    }

    fn stack() -> (TcpStack, Arc<Capture>, Arc<SockHashTable>) {
        let tx = Arc::new(Capture::default());
        let table = Arc::new(SockHashTable::new());
        let timer = Arc::new(TimeWaitList::new(Duration::from_secs(2)));
        let stack = TcpStack::new(TcpConfig::default(), table.clone(), tx.clone(), timer);
        (stack, tx, table)
    }

    fn established(stack: &TcpStack, table: &SockHashTable) -> Arc<TcpSock> {
        let sock = stack.socket();
        {
            let mut st = sock.lock();
            st.conn_mgmt.tuple = crate::tcp_types::FourTuple::new(local(), remote());
            st.rod.snd_una = 1000;
            st.rod.snd_nxt = 1000;
            st.rod.rcv_nxt = 5000;
            st.flow_ctrl.snd_wnd = 8192;
            st.set_state(TcpState::Established);
            table.hash(&sock, st.conn_mgmt.tuple).unwrap();
        }
        sock
    }

    fn seg(flags: TcpFlags, seq: u32, ack: u32, payload: &[u8]) -> TcpSegment {
        TcpSegment::new(remote(), local(), flags, seq, ack, 8192, payload)
    }

    #[test]
    fn test_data_is_delivered_and_acked() {
        let (stack, tx, table) = stack();
        let sock = established(&stack, &table);

        stack.process(&sock, &seg(TcpFlags::ACK | TcpFlags::PSH, 5000, 1000, b"hello"));

        let st = sock.lock();
        assert_eq!(st.rod.rcv_nxt, 5005);
        assert_eq!(st.rod.rcv_buf.len(), 5);
        assert_eq!(st.flow_ctrl.rcv_wnd, 65535 - 5);
        assert_eq!(sock.wait_recv.wakeups(), 1);
        let sent = tx.0.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].flags, TcpFlags::ACK);
        assert_eq!(sent[0].ack, 5005);
    }

    #[test]
    fn test_bare_ack_gets_no_reply() {
        let (stack, tx, table) = stack();
        let sock = established(&stack, &table);

        stack.process(&sock, &seg(TcpFlags::ACK, 5000, 1000, &[]));

        assert!(tx.0.lock().is_empty());
        assert_eq!(sock.lock().rod.rcv_nxt, 5000);
    }

    #[test]
    fn test_data_with_plain_ack_flag_is_acked() {
        let (stack, tx, table) = stack();
        let sock = established(&stack, &table);

        stack.process(&sock, &seg(TcpFlags::ACK, 5000, 1000, b"abc"));

        assert_eq!(sock.lock().rod.rcv_nxt, 5003);
        assert_eq!(tx.0.lock().len(), 1);
    }

    #[test]
    fn test_gap_is_not_delivered() {
        let (stack, tx, table) = stack();
        let sock = established(&stack, &table);

        stack.process(&sock, &seg(TcpFlags::ACK, 5010, 1000, b"later"));

        let st = sock.lock();
        assert_eq!(st.rod.rcv_nxt, 5000);
        assert!(st.rod.rcv_buf.is_empty());
        assert_eq!(st.flow_ctrl.rcv_wnd, 65535);
        assert_eq!(tx.0.lock()[0].ack, 5000);
    }

    #[test]
    fn test_segment_without_ack_or_fin_dropped() {
        let (stack, tx, table) = stack();
        let sock = established(&stack, &table);

        stack.process(&sock, &seg(TcpFlags::PSH, 5000, 0, b"data"));

        assert!(tx.0.lock().is_empty());
        assert!(sock.lock().rod.rcv_buf.is_empty());
    }

    #[test]
    fn test_syn_after_handshake_tears_down() {
        let (stack, tx, table) = stack();
        let sock = established(&stack, &table);
        let tuple = sock.four_tuple();

        stack.process(&sock, &seg(TcpFlags::SYN, 5000, 0, &[]));

        assert_eq!(sock.state(), TcpState::Closed);
        assert!(!table.contains(&tuple));
        assert!(tx.0.lock()[0].flags.is_rst());
    }
}
