//! End-to-end client behavior against an in-process mock peer.
//!
//! The mock speaks the framed protocol through the wire crate's
//! symmetric codec: it decodes requests and writes back whatever frames
//! the test's handler decides, including unsolicited event frames.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::{BufMut, BytesMut};
use vicebridge_client::{
    encode_checkpoint_body, CheckpointKind, CheckpointOptions, ClientError, ConnectionConfig,
    MemSpace, MonitorClient,
};
use vicebridge_wire::{codec, status, ProtocolVersion, Request, DEFAULT_MAX_BODY};

struct Reply {
    kind: u8,
    status: u8,
    request_id: u32,
    body: Vec<u8>,
}

fn ok(request: &Request, body: Vec<u8>) -> Reply {
    Reply {
        kind: request.command,
        status: status::OK,
        request_id: request.request_id,
        body,
    }
}

fn error(request: &Request, status: u8) -> Reply {
    Reply {
        kind: request.command,
        status,
        request_id: request.request_id,
        body: Vec::new(),
    }
}

fn event(protocol: &ProtocolVersion, kind: u8, body: Vec<u8>) -> Reply {
    Reply {
        kind,
        status: status::OK,
        request_id: protocol.wire.async_request_id,
        body,
    }
}

/// Accept one connection and answer requests with the handler's replies.
/// A `None` from the handler closes the connection.
fn spawn_peer(
    protocol: ProtocolVersion,
    mut handler: impl FnMut(&Request) -> Option<Vec<Reply>> + Send + 'static,
) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("mock peer should bind");
    let port = listener.local_addr().expect("local addr").port();

    thread::spawn(move || {
        let (mut stream, _) = match listener.accept() {
            Ok(conn) => conn,
            Err(_) => return,
        };
        let mut buf = BytesMut::new();
        let mut chunk = [0u8; 4096];
        loop {
            let read = match stream.read(&mut chunk) {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..read]);
            loop {
                match codec::decode_request(&mut buf, &protocol.wire, DEFAULT_MAX_BODY) {
                    Ok(Some(request)) => {
                        let Some(replies) = handler(&request) else {
                            return;
                        };
                        for reply in replies {
                            let mut out = BytesMut::new();
                            codec::encode_response(
                                &protocol.wire,
                                reply.kind,
                                reply.status,
                                reply.request_id,
                                &reply.body,
                                &mut out,
                            )
                            .expect("mock reply should encode");
                            if stream.write_all(&out).is_err() {
                                return;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(_) => return,
                }
            }
        }
    });
    port
}

fn client_for(port: u16, protocol: ProtocolVersion, call_timeout: Duration) -> MonitorClient {
    MonitorClient::new(ConnectionConfig {
        host: "127.0.0.1".to_string(),
        port,
        protocol,
        call_timeout,
        ..ConnectionConfig::default()
    })
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn read_memory_returns_screen_codes_byte_for_byte() {
    let screen_codes: Vec<u8> = (0..40).map(|i| (i % 26 + 1) as u8).collect();
    let protocol = ProtocolVersion::v2();
    let expected_mem_get = protocol.commands.mem_get;

    let codes = screen_codes.clone();
    let port = spawn_peer(protocol.clone(), move |request| {
        assert_eq!(request.command, expected_mem_get);
        // flags + start + end + memspace + bank
        assert_eq!(request.body.len(), 8);
        let mut body = BytesMut::new();
        body.put_u16_le(codes.len() as u16);
        body.put_slice(&codes);
        Some(vec![ok(request, body.to_vec())])
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    let data = client
        .read_memory(0x0400, 0x0427, MemSpace::Main)
        .expect("read should succeed");
    assert_eq!(data.len(), 40);
    assert_eq!(data, screen_codes);
}

#[test]
fn rejected_operations_send_no_bytes() {
    let protocol = ProtocolVersion::v2();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let port = spawn_peer(protocol.clone(), move |request| {
        log.lock().unwrap().push(request.command);
        Some(vec![ok(request, Vec::new())])
    });

    let client = client_for(port, protocol.clone(), Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    assert!(client.read_memory(0x0500, 0x0400, MemSpace::Main).is_err());
    assert!(client.write_memory(0x0400, &[], MemSpace::Main).is_err());
    assert!(client.step(0, false).is_err());

    // The ping arrives over the same ordered stream, so if any rejected
    // operation had reached the wire it would be in the log before it.
    client.ping().expect("ping should succeed");
    assert_eq!(seen.lock().unwrap().as_slice(), &[protocol.commands.ping]);
}

#[test]
fn socket_close_rejects_every_pending_call_exactly_once() {
    let protocol = ProtocolVersion::v2();
    let received = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&received);
    let port = spawn_peer(protocol.clone(), move |_request| {
        // Swallow three requests without answering, then drop the socket.
        if counter.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
            None
        } else {
            Some(Vec::new())
        }
    });

    let client = Arc::new(client_for(port, protocol, Duration::from_secs(10)));
    client.connect().expect("connect should succeed");

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let client = Arc::clone(&client);
            thread::spawn(move || client.ping())
        })
        .collect();

    let mut rejections = 0;
    for worker in workers {
        let result = worker.join().expect("worker should not panic");
        match result {
            Err(ClientError::ConnectionClosed) => rejections += 1,
            other => panic!("expected ConnectionClosed, got {other:?}"),
        }
    }
    assert_eq!(rejections, 3);
    assert!(!client.is_connected());
}

#[test]
fn timeout_leaves_other_pending_calls_untouched() {
    let protocol = ProtocolVersion::v2();
    let mem_get = protocol.commands.mem_get;
    let port = spawn_peer(protocol.clone(), move |request| {
        if request.command == mem_get {
            // Never answer memory reads.
            Some(Vec::new())
        } else {
            Some(vec![ok(request, Vec::new())])
        }
    });

    let client = Arc::new(client_for(port, protocol, Duration::from_millis(400)));
    client.connect().expect("connect should succeed");

    let slow = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.read_memory(0x0000, 0x0001, MemSpace::Main))
    };
    // The ping shares the connection while the read is pending.
    client.ping().expect("ping should succeed");

    let result = slow.join().expect("worker should not panic");
    assert!(matches!(result, Err(ClientError::ResponseTimeout(_))));
    assert!(client.is_connected());
}

#[test]
fn sentinel_tagged_reply_resolves_by_expected_kind() {
    let protocol = ProtocolVersion::v2();
    let registers_get = protocol.commands.registers_get;
    let reply_protocol = protocol.clone();
    let port = spawn_peer(protocol.clone(), move |request| {
        if request.command == registers_get {
            let mut body = BytesMut::new();
            body.put_u16_le(6);
            for (id, value) in [
                (0u8, 0x12u16),
                (1, 0x34),
                (2, 0x56),
                (3, 0xc000),
                (4, 0xf3),
                (5, 0b1010_0011),
            ] {
                body.put_u8(3);
                body.put_u8(id);
                body.put_u16_le(value);
            }
            // Answer out-of-band: async sentinel id, matching kind.
            Some(vec![event(&reply_protocol, registers_get, body.to_vec())])
        } else {
            Some(vec![ok(request, Vec::new())])
        }
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    let registers = client.registers(MemSpace::Main).expect("registers");
    assert_eq!(registers.a, 0x12);
    assert_eq!(registers.x, 0x34);
    assert_eq!(registers.y, 0x56);
    assert_eq!(registers.pc, 0xc000);
    assert_eq!(registers.sp, 0xf3);
    assert!(registers.flags.negative);
    assert!(registers.flags.zero);
    assert!(registers.flags.carry);
}

#[test]
fn watchpoint_set_then_delete_leaves_local_map_empty() {
    let protocol = ProtocolVersion::v2();
    let checkpoint_set = protocol.commands.checkpoint_set;
    let port = spawn_peer(protocol.clone(), move |request| {
        if request.command == checkpoint_set {
            let checkpoint = vicebridge_client::Checkpoint {
                id: 7,
                start: 0xd020,
                end: 0xd020,
                enabled: true,
                temporary: false,
                kind: CheckpointKind::Store,
                hit_count: 0,
                ignore_count: 0,
            };
            Some(vec![ok(request, encode_checkpoint_body(&checkpoint, false))])
        } else {
            Some(vec![ok(request, Vec::new())])
        }
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    let checkpoint = client
        .set_watchpoint(
            0xd020,
            0xd020,
            CheckpointKind::Store,
            CheckpointOptions::default(),
        )
        .expect("watchpoint should be confirmed");
    assert_eq!(checkpoint.id, 7);
    assert_eq!(client.checkpoints().len(), 1);

    client
        .delete_checkpoint(checkpoint.id)
        .expect("delete should succeed");
    assert!(client.checkpoints().is_empty());
}

#[test]
fn deleting_an_unknown_checkpoint_still_asks_the_peer() {
    let protocol = ProtocolVersion::v2();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let port = spawn_peer(protocol.clone(), move |request| {
        log.lock().unwrap().push(request.command);
        Some(vec![ok(request, Vec::new())])
    });

    let client = client_for(port, protocol.clone(), Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    client
        .delete_checkpoint(99)
        .expect("peer is authoritative, no local error");
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[protocol.commands.checkpoint_delete]
    );
}

#[test]
fn temporary_checkpoint_hit_evicts_the_local_entry() {
    let protocol = ProtocolVersion::v2();
    let checkpoint_set = protocol.commands.checkpoint_set;
    let checkpoint_get = protocol.commands.checkpoint_get;
    let ping = protocol.commands.ping;
    let reply_protocol = protocol.clone();
    let port = spawn_peer(protocol.clone(), move |request| {
        if request.command == checkpoint_set {
            let checkpoint = vicebridge_client::Checkpoint {
                id: 3,
                start: 0x0810,
                end: 0x0810,
                enabled: true,
                temporary: true,
                kind: CheckpointKind::Exec,
                hit_count: 0,
                ignore_count: 0,
            };
            Some(vec![ok(request, encode_checkpoint_body(&checkpoint, false))])
        } else if request.command == ping {
            let consumed = vicebridge_client::Checkpoint {
                id: 3,
                start: 0x0810,
                end: 0x0810,
                enabled: true,
                temporary: true,
                kind: CheckpointKind::Exec,
                hit_count: 1,
                ignore_count: 0,
            };
            // Unsolicited hit report ahead of the ping ack; both ride the
            // same ordered stream, so the eviction lands first.
            Some(vec![
                event(
                    &reply_protocol,
                    checkpoint_get,
                    encode_checkpoint_body(&consumed, true),
                ),
                ok(request, Vec::new()),
            ])
        } else {
            Some(vec![ok(request, Vec::new())])
        }
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    client
        .set_breakpoint(
            0x0810,
            0x0810,
            CheckpointOptions {
                temporary: true,
                ..CheckpointOptions::default()
            },
        )
        .expect("breakpoint should be confirmed");
    assert_eq!(client.checkpoints().len(), 1);

    client.ping().expect("ping should succeed");
    assert!(client.checkpoints().is_empty());
}

#[test]
fn run_state_events_flow_into_state_and_sinks() {
    let protocol = ProtocolVersion::v2();
    let advance = protocol.commands.advance_instructions;
    let exit = protocol.commands.exit;
    let stopped = protocol.events.stopped;
    let resumed = protocol.events.resumed;
    let reply_protocol = protocol.clone();
    let port = spawn_peer(protocol.clone(), move |request| {
        let mut pc_body = BytesMut::new();
        pc_body.put_u16_le(0xc000);
        if request.command == advance {
            Some(vec![
                ok(request, Vec::new()),
                event(&reply_protocol, stopped, pc_body.to_vec()),
            ])
        } else if request.command == exit {
            Some(vec![
                ok(request, Vec::new()),
                event(&reply_protocol, resumed, pc_body.to_vec()),
            ])
        } else {
            Some(vec![ok(request, Vec::new())])
        }
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink_log = Arc::clone(&observed);
    client.on_run_state_changed(Box::new(move |running| {
        sink_log.lock().unwrap().push(running);
    }));

    client.connect().expect("connect should succeed");
    assert!(client.state().running);

    client.step(1, false).expect("step should succeed");
    assert!(wait_until(Duration::from_secs(2), || {
        observed.lock().unwrap().contains(&false)
    }));
    assert!(!client.state().running);

    client.resume().expect("resume should succeed");
    assert!(wait_until(Duration::from_secs(2), || {
        observed.lock().unwrap().contains(&true)
    }));
    assert!(client.state().running);
}

#[test]
fn peer_error_status_becomes_a_classified_error() {
    let protocol = ProtocolVersion::v2();
    let port = spawn_peer(protocol.clone(), move |request| {
        Some(vec![error(request, status::OBJECT_MISSING)])
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    let err = client.delete_checkpoint(1).unwrap_err();
    assert_eq!(err.kind(), "object-missing");
    assert!(err.suggestion().is_some());
}

#[test]
fn second_connect_is_rejected_while_open() {
    let protocol = ProtocolVersion::v2();
    let port = spawn_peer(protocol.clone(), move |request| {
        Some(vec![ok(request, Vec::new())])
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    client.connect().expect("first connect should succeed");
    let err = client.connect().unwrap_err();
    assert!(matches!(err, ClientError::AlreadyConnected { .. }));

    // After an explicit disconnect the slot is free again.
    client.disconnect();
    assert!(!client.is_connected());
}

#[test]
fn connect_failure_carries_a_remediation_hint() {
    // Bind then drop to land on a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    };

    let client = client_for(port, ProtocolVersion::v2(), Duration::from_secs(2));
    let err = client.connect().unwrap_err();
    assert!(matches!(
        err,
        ClientError::ConnectFailed { .. } | ClientError::ConnectTimeout { .. }
    ));
    assert!(err.suggestion().unwrap().contains("binary monitor"));
}

#[test]
fn first_generation_layout_works_end_to_end() {
    let protocol = ProtocolVersion::v1();
    let mem_get = protocol.commands.mem_get;
    let port = spawn_peer(protocol.clone(), move |request| {
        if request.command == mem_get {
            let mut body = BytesMut::new();
            body.put_u16_le(2);
            body.put_slice(&[0xa9, 0x00]);
            Some(vec![ok(request, body.to_vec())])
        } else {
            Some(vec![ok(request, Vec::new())])
        }
    });

    let client = client_for(port, protocol, Duration::from_secs(2));
    client.connect().expect("connect should succeed");

    client.ping().expect("ping over v1 framing");
    let data = client
        .read_memory(0xc000, 0xc001, MemSpace::Main)
        .expect("read over v1 framing");
    assert_eq!(data, vec![0xa9, 0x00]);
}
