use std::sync::Arc;
use std::thread;
use std::time::Duration;

use proptest::prelude::*;
use transmission::{managed_pair, TransmissionError};

mod common;
use common::{pair, short_timeout_config};

#[test]
fn exact_read_of_zero_is_rejected() {
    let (_a, b) = pair();
    assert!(matches!(
        b.read_exact(0),
        Err(TransmissionError::InvalidArgument(_))
    ));
    assert!(matches!(
        b.read_up_to(0),
        Err(TransmissionError::InvalidArgument(_))
    ));
}

#[test]
fn exact_read_keeps_surplus_buffered() {
    let (a, b) = pair();
    a.write(b"hello world").unwrap();

    assert_eq!(&b.read_exact(5).unwrap()[..], b"hello");
    assert_eq!(b.buffered(), 6);
    assert_eq!(&b.read_up_to(100).unwrap()[..], b" world");
    assert_eq!(b.buffered(), 0);
}

#[test]
fn bounded_read_returns_what_is_available() {
    let (a, b) = managed_pair(short_timeout_config()).unwrap();

    a.write(b"abc").unwrap();
    assert_eq!(&b.read_up_to(10).unwrap()[..], b"abc");

    // An exact read of the same amount of data waits for more and times out.
    a.write(b"abc").unwrap();
    let err = b.read_exact(10).unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(b.buffered(), 3);

    a.write(b"defghij").unwrap();
    assert_eq!(&b.read_exact(10).unwrap()[..], b"abcdefghij");
}

#[test]
fn message_larger_than_bounded_read_is_split() {
    let (a, b) = pair();
    a.write(b"abcdef").unwrap();

    assert_eq!(&b.read_up_to(2).unwrap()[..], b"ab");
    assert_eq!(&b.read_up_to(10).unwrap()[..], b"cdef");
}

#[test]
fn peer_close_mid_read_is_terminal() {
    let (a, b) = pair();
    a.write(b"ab").unwrap();
    a.close().unwrap();

    assert!(matches!(
        b.read_exact(4),
        Err(TransmissionError::ConnectionClosed)
    ));
    // Buffered bytes are not handed out once the peer is gone.
    assert!(matches!(
        b.read_up_to(1),
        Err(TransmissionError::ConnectionClosed)
    ));
    assert!(matches!(
        b.write(b"late"),
        Err(TransmissionError::ConnectionClosed)
    ));
}

#[test]
fn bounded_read_after_peer_close() {
    let (a, b) = pair();
    drop(a);
    let err = b.read_up_to(8).unwrap_err();
    assert!(err.is_terminal());
}

#[test]
fn operations_after_close_fail() {
    let (_a, b) = pair();
    b.close().unwrap();
    b.close().unwrap();
    assert!(b.is_closed());

    assert!(matches!(b.read_exact(1), Err(TransmissionError::Closed)));
    assert!(matches!(b.read_up_to(1), Err(TransmissionError::Closed)));
    assert!(matches!(b.write(b"x"), Err(TransmissionError::Closed)));
    assert!(matches!(
        b.write_with_length_prefix(b"x", transmission::PrefixWidth::U8),
        Err(TransmissionError::Closed)
    ));
}

#[test]
fn close_wakes_blocked_reader() {
    let (_a, b) = pair();
    let b = Arc::new(b);
    let reader = {
        let b = Arc::clone(&b);
        thread::spawn(move || b.read_exact(4))
    };

    thread::sleep(Duration::from_millis(50));
    b.close().unwrap();

    let result = reader.join().unwrap();
    assert!(matches!(result, Err(TransmissionError::Closed)));
}

#[test]
fn write_str_sends_utf8() {
    let (a, b) = pair();
    a.write_str("héllo").unwrap();
    assert_eq!(&b.read_exact(6).unwrap()[..], "héllo".as_bytes());
}

#[test]
fn managed_identifiers_are_distinct() {
    let (a, b) = pair();
    assert_ne!(a.identifier(), b.identifier());
    assert_eq!(a.kind(), transmission::BackendKind::Managed);
}

proptest! {
    #[test]
    fn exact_read_reassembles_any_split(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        cuts in proptest::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let (a, b) = pair();

        let mut points: Vec<usize> = cuts.iter().map(|i| i.index(payload.len())).collect();
        points.push(0);
        points.push(payload.len());
        points.sort_unstable();
        points.dedup();

        for window in points.windows(2) {
            a.write(&payload[window[0]..window[1]]).unwrap();
        }

        let got = b.read_exact(payload.len()).unwrap();
        prop_assert_eq!(&got[..], &payload[..]);
        prop_assert_eq!(b.buffered(), 0);
    }
}
