//! Tests for the connection registry.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use actorcore_protocol::{ReplyFlag, ReplyLine};
use rstest::{fixture, rstest};

use crate::session::test_support::{BrokenTransport, MemoryTransport};
use crate::transport::{ConnectionHandler, ConnectionStream};

use super::*;

#[fixture]
fn registry() -> Arc<ConnectionRegistry> {
    Arc::new(ConnectionRegistry::new())
}

fn inform(connection_id: u32, message_id: u64, text: &str) -> ReplyLine {
    ReplyLine::new(connection_id, message_id, ReplyFlag::Inform, text)
}

#[rstest]
fn connection_ids_start_at_one_and_are_not_reused(registry: Arc<ConnectionRegistry>) {
    let first = registry
        .attach(Box::new(MemoryTransport::default()))
        .expect("attach");
    let second = registry
        .attach(Box::new(MemoryTransport::default()))
        .expect("attach");
    registry.unregister(first).expect("unregister");
    let third = registry
        .attach(Box::new(MemoryTransport::default()))
        .expect("attach");
    assert_eq!((first, second, third), (1, 2, 3));
    assert_eq!(registry.connection_ids(), vec![2, 3]);
}

#[rstest]
fn attach_sends_the_handshake(registry: Arc<ConnectionRegistry>) {
    let transport = MemoryTransport::default();
    registry.attach(Box::new(transport.clone())).expect("attach");
    assert_eq!(transport.lines(), vec!["1 0 i yourUserNum=1"]);
}

#[rstest]
fn unregistering_twice_is_an_error(registry: Arc<ConnectionRegistry>) {
    let id = registry
        .attach(Box::new(MemoryTransport::default()))
        .expect("attach");
    registry.unregister(id).expect("first unregister");
    let error = registry.unregister(id).expect_err("second unregister");
    assert!(matches!(
        error,
        RegistryError::NotRegistered { connection_id } if connection_id == id
    ));
}

#[rstest]
fn broadcast_skips_dead_transports(registry: Arc<ConnectionRegistry>) {
    let healthy: Vec<MemoryTransport> = (0..3).map(|_| MemoryTransport::default()).collect();
    registry
        .attach(Box::new(healthy[0].clone()))
        .expect("attach");
    registry.attach(Box::new(BrokenTransport)).expect("attach");
    for transport in &healthy[1..] {
        registry.attach(Box::new(transport.clone())).expect("attach");
    }

    let delivered = registry.broadcast(&inform(0, 0, "text=\"hello\""));

    assert_eq!(delivered, 3);
    for transport in &healthy {
        assert_eq!(
            transport.lines().last().map(String::as_str),
            Some("0 0 i text=\"hello\"")
        );
    }
}

#[rstest]
fn replies_go_to_their_origin_session_only(registry: Arc<ConnectionRegistry>) {
    let first = MemoryTransport::default();
    let second = MemoryTransport::default();
    registry.attach(Box::new(first.clone())).expect("attach");
    registry.attach(Box::new(second.clone())).expect("attach");

    registry.send_reply(&inform(2, 5, "a=1"));

    assert_eq!(first.lines(), vec!["1 0 i yourUserNum=1"]);
    assert_eq!(second.lines(), vec!["2 0 i yourUserNum=2", "2 5 i a=1"]);
}

#[rstest]
#[case(0)]
#[case(99)]
fn broadcast_and_unknown_connections_reach_everyone(
    registry: Arc<ConnectionRegistry>,
    #[case] connection_id: u32,
) {
    let first = MemoryTransport::default();
    let second = MemoryTransport::default();
    registry.attach(Box::new(first.clone())).expect("attach");
    registry.attach(Box::new(second.clone())).expect("attach");

    registry.send_reply(&inform(connection_id, 1, "b=2"));

    let expected = format!("{connection_id} 1 i b=2");
    assert_eq!(first.lines().last(), Some(&expected));
    assert_eq!(second.lines().last(), Some(&expected));
}

#[rstest]
fn send_to_unknown_connection_fails(registry: Arc<ConnectionRegistry>) {
    let error = registry
        .send_to(7, &inform(7, 1, "x=1"))
        .expect_err("unknown connection");
    assert!(matches!(error, RegistryError::NotRegistered { .. }));
}

#[rstest]
fn shutdown_session_announces_and_closes(registry: Arc<ConnectionRegistry>) {
    let observer = MemoryTransport::default();
    let doomed = MemoryTransport::default();
    registry.attach(Box::new(observer.clone())).expect("attach");
    let id = registry.attach(Box::new(doomed.clone())).expect("attach");

    registry.shutdown_session(id, "test").expect("shutdown");

    assert!(doomed.is_closed());
    assert!(!observer.is_closed());
    assert_eq!(
        observer.lines().last().map(String::as_str),
        Some("0 0 i text=\"shutting connection 2 down\"")
    );
}

#[derive(Default)]
struct RecordingSubmitter {
    lines: Mutex<Vec<(u32, Vec<u8>)>>,
}

impl RecordingSubmitter {
    fn wait_for(&self, expected: usize) -> Vec<(u32, Vec<u8>)> {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let lines = self.lines.lock().expect("submitter lock").clone();
            if lines.len() >= expected || Instant::now() >= deadline {
                return lines;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl LineSubmitter for RecordingSubmitter {
    fn submit_line(&self, connection_id: u32, line: &[u8]) {
        self.lines
            .lock()
            .expect("submitter lock")
            .push((connection_id, line.to_vec()));
    }
}

#[rstest]
fn session_handler_greets_reads_and_unregisters(registry: Arc<ConnectionRegistry>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let addr = listener.local_addr().expect("addr");
    let submitter = Arc::new(RecordingSubmitter::default());
    let handler = SessionHandler::new(Arc::clone(&registry), submitter.clone());
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        handler.handle(ConnectionStream::new(stream));
    });

    let mut client = TcpStream::connect(addr).expect("connect");
    let mut greeting = String::new();
    BufReader::new(client.try_clone().expect("clone"))
        .read_line(&mut greeting)
        .expect("read handshake");
    assert_eq!(greeting, "1 0 i yourUserNum=1\n");

    client.write_all(b"ping\r\n7 status\n").expect("write");
    let lines = submitter.wait_for(2);
    assert_eq!(
        lines,
        vec![(1, b"ping\r".to_vec()), (1, b"7 status".to_vec())]
    );

    drop(client);
    server.join().expect("server join");
    assert!(registry.connection_ids().is_empty());
}
