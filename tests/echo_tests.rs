//! End-to-end test: an echo server and client on two stacks wired back to
//! back, driven only through the socket calls.


use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tcp_stack_rust::{
    OutSegment, SockHashTable, TcpConfig, TcpStack, TcpState, TimeWaitList, Transmit,
};

const SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const CLIENT_IP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
const SERVER_PORT: u16 = 10001;
const CLIENT_PORT: u16 = 12345;
const PREFIX: &[u8] = b"server echoes: ";

/// One direction of the link.
struct Wire {
    tx: Mutex<Sender<OutSegment>>,
}

impl Transmit for Wire {
    fn transmit(&self, seg: OutSegment) {
        let _ = self.tx.lock().send(seg);
    }
}

fn wired_stack(config: TcpConfig) -> (TcpStack, Arc<TimeWaitList>, Receiver<OutSegment>) {
    let (tx, rx) = mpsc::channel();
    let timer = Arc::new(TimeWaitList::new(config.timewait_timeout()));
    let stack = TcpStack::new(
        config,
        Arc::new(SockHashTable::new()),
        Arc::new(Wire { tx: Mutex::new(tx) }),
        timer.clone(),
    );
    (stack, timer, rx)
}

/// Deliver everything `rx` carries to `to` until `stop` is raised.
fn pump(rx: Receiver<OutSegment>, to: &TcpStack, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        match rx.recv_timeout(Duration::from_millis(10)) {
            Ok(seg) => to.input(&seg.to_incoming()),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_echo_client_server() {
    test_helpers::init_logging();
    let (server, _server_timer, server_rx) = wired_stack(TcpConfig::default());
    let (client, client_timer, client_rx) = wired_stack(TcpConfig::default());
    let stop = AtomicBool::new(false);
    let message: Vec<u8> = (b'0'..=b'9').chain(b'a'..=b'z').chain(b'A'..=b'Z').collect();

    let listener = server.socket();
    server
        .bind(&listener, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, SERVER_PORT))
        .unwrap();
    server.listen(&listener, 3).unwrap();

    thread::scope(|s| {
        s.spawn(|| pump(server_rx, &client, &stop));
        s.spawn(|| pump(client_rx, &server, &stop));

        let echo = s.spawn(|| {
            let conn = server.accept(&listener).unwrap();
            let mut buf = [0u8; 1000];
            loop {
                let n = server.read(&conn, &mut buf).unwrap();
                if n == 0 {
                    break;
                }
                let mut reply = PREFIX.to_vec();
                reply.extend_from_slice(&buf[..n]);
                server.write(&conn, &reply).unwrap();
            }
            server.close(&conn).unwrap();
            conn
        });

        let sock = client.socket();
        client.bind(&sock, SocketAddrV4::new(CLIENT_IP, CLIENT_PORT)).unwrap();
        client.connect(&sock, SocketAddrV4::new(SERVER_IP, SERVER_PORT)).unwrap();
        assert_eq!(sock.state(), TcpState::Established);

        let mut expected = PREFIX.to_vec();
        expected.extend_from_slice(&message);
        for _ in 0..10 {
            assert_eq!(client.write(&sock, &message), Ok(message.len()));

            let mut got = Vec::new();
            let mut buf = [0u8; 1000];
            while got.len() < expected.len() {
                let n = client.read(&sock, &mut buf).unwrap();
                assert!(n > 0, "stream ended early");
                got.extend_from_slice(&buf[..n]);
            }
            assert_eq!(got, expected);
        }

        client.close(&sock).unwrap();
        let conn = echo.join().unwrap();

        wait_until("server side closed", || conn.state() == TcpState::Closed);
        wait_until("client time-wait armed", || client_timer.len() == 1);
        assert_eq!(sock.state(), TcpState::FinWait2);

        client.expire_timers(Instant::now() + Duration::from_secs(10));
        assert_eq!(sock.state(), TcpState::Closed);

        stop.store(true, Ordering::Relaxed);
    });

    assert_eq!(listener.state(), TcpState::Listen);
    server.close(&listener).unwrap();
    assert_eq!(listener.state(), TcpState::Closed);
}
