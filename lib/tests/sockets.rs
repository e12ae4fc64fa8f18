use std::thread;
use std::time::Duration;

use transmission::{
    BackendKind, Connection, ConnectionKind, Listener, PrefixWidth, TransmissionError,
};

mod common;
use common::test_config;

fn tcp_listener() -> (Listener, u16) {
    let listener = Listener::bind_with("127.0.0.1:0", ConnectionKind::Tcp, test_config()).unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[test]
fn tcp_round_trip_for_every_width() {
    let (listener, port) = tcp_listener();

    let server = thread::spawn(move || {
        let connection = listener.accept().unwrap();
        for width in PrefixWidth::ALL {
            let frame = connection.read_with_length_prefix(width).unwrap();
            connection.write_with_length_prefix(&frame, width).unwrap();
        }
    });

    let client = Connection::connect_with("127.0.0.1", port, ConnectionKind::Tcp, test_config()).unwrap();
    assert_eq!(client.kind(), BackendKind::Stream);
    assert!(client.identifier() >= 0);

    for width in PrefixWidth::ALL {
        let payload = format!("frame with a {}-bit prefix", width.bits());
        client.write_with_length_prefix(payload.as_bytes(), width).unwrap();
        let echoed = client.read_with_length_prefix(width).unwrap();
        assert_eq!(&echoed[..], payload.as_bytes());
    }

    server.join().unwrap();
}

#[test]
fn tcp_peer_close_mid_read() {
    let (listener, port) = tcp_listener();

    let server = thread::spawn(move || {
        let connection = listener.accept().unwrap();
        connection.write(b"ab").unwrap();
        connection.close().unwrap();
    });

    let client = Connection::connect_with("127.0.0.1", port, ConnectionKind::Tcp, test_config()).unwrap();
    server.join().unwrap();

    assert!(matches!(
        client.read_exact(4),
        Err(TransmissionError::ConnectionClosed)
    ));
}

#[test]
fn tcp_large_exact_read() {
    let (listener, port) = tcp_listener();
    let payload: Vec<u8> = (0..3_000_000u32).map(|i| (i % 253) as u8).collect();
    let expected = payload.clone();

    let server = thread::spawn(move || {
        let connection = listener.accept().unwrap();
        connection.write(&payload).unwrap();
    });

    let client = Connection::connect_with("127.0.0.1", port, ConnectionKind::Tcp, test_config()).unwrap();
    let got = client.read_exact(expected.len()).unwrap();
    assert!(got[..] == expected[..]);
    server.join().unwrap();
}

#[test]
fn socket_buffer_size_is_applied() {
    let (listener, port) = tcp_listener();
    let config = test_config().with_socket_buffer_size(64 * 1024).with_label("sized");

    let client = Connection::connect_with("127.0.0.1", port, ConnectionKind::Tcp, config).unwrap();
    let server = listener.accept().unwrap();

    client.write(b"x").unwrap();
    assert_eq!(&server.read_exact(1).unwrap()[..], b"x");
    assert_eq!(client.config().label.as_deref(), Some("sized"));
}

#[test]
fn listener_close_wakes_accept() {
    let (listener, _port) = tcp_listener();
    let listener = std::sync::Arc::new(listener);

    let acceptor = {
        let listener = std::sync::Arc::clone(&listener);
        thread::spawn(move || listener.accept())
    };
    thread::sleep(Duration::from_millis(50));
    listener.close().unwrap();

    assert!(matches!(
        acceptor.join().unwrap(),
        Err(TransmissionError::Closed)
    ));
    assert!(matches!(listener.accept(), Err(TransmissionError::Closed)));
}

#[test]
fn udp_server_learns_its_peer() {
    let listener = Listener::bind_with("127.0.0.1:0", ConnectionKind::Udp, test_config()).unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = listener.accept().unwrap();
    assert_eq!(server.kind(), BackendKind::Datagram);

    assert!(matches!(
        server.write(b"too early"),
        Err(TransmissionError::NotConnected)
    ));
    assert!(matches!(
        listener.accept(),
        Err(TransmissionError::InvalidArgument(_))
    ));

    let client = Connection::connect_with("127.0.0.1", port, ConnectionKind::Udp, test_config()).unwrap();
    client.write_with_length_prefix(b"ping", PrefixWidth::U16).unwrap();
    assert_eq!(&server.read_with_length_prefix(PrefixWidth::U16).unwrap()[..], b"ping");

    server.write_with_length_prefix(b"pong", PrefixWidth::U16).unwrap();
    assert_eq!(&client.read_with_length_prefix(PrefixWidth::U16).unwrap()[..], b"pong");

    // Closing the listener leaves the handed-out connection usable.
    listener.close().unwrap();
    client.write(b"still here").unwrap();
    assert_eq!(&server.read_up_to(64).unwrap()[..], b"still here");
}

#[test]
fn unix_round_trip() {
    let path = std::env::temp_dir().join(format!("transmission-test-{}.sock", std::process::id()));
    let listener = Listener::bind_unix(&path, test_config()).unwrap();
    assert_eq!(listener.kind(), BackendKind::Stream);

    let client = Connection::connect_unix(&path, test_config()).unwrap();
    let server = listener.accept().unwrap();

    client.write_with_length_prefix(b"over a unix socket", PrefixWidth::U32).unwrap();
    assert_eq!(
        &server.read_with_length_prefix(PrefixWidth::U32).unwrap()[..],
        b"over a unix socket"
    );

    listener.close().unwrap();
    assert!(!path.exists());
}

#[test]
fn managed_listener_accepts_sessions() {
    let (listener, connector) = Listener::managed(test_config());
    let client = Connection::new(Box::new(connector.connect().unwrap()), test_config()).unwrap();
    let server = listener.accept().unwrap();

    client.write_str("hello").unwrap();
    assert_eq!(&server.read_exact(5).unwrap()[..], b"hello");
    assert_eq!(server.kind(), BackendKind::Managed);
}
