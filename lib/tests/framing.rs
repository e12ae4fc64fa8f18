use transmission::{managed_pair, ConnectionConfig, PrefixWidth, TransmissionError};

mod common;
use common::{pair, short_timeout_config, TEST_TIMEOUT};

#[test]
fn sixteen_bit_frame_consumes_only_its_bytes() {
    let (a, b) = pair();
    a.write(&[0x00, 0x04, b't', b'e', b's', b't', 0xFF]).unwrap();

    let frame = b.read_with_length_prefix(PrefixWidth::U16).unwrap();
    assert_eq!(&frame[..], b"test");
    assert_eq!(b.buffered(), 1);
    assert_eq!(&b.read_exact(1).unwrap()[..], &[0xFF]);
}

#[test]
fn frame_goes_out_as_one_write() {
    let (a, b) = pair();
    a.write_with_length_prefix(b"abc", PrefixWidth::U8).unwrap();

    // A managed backend delivers one message per write.
    assert_eq!(&b.read_up_to(100).unwrap()[..], &[3, b'a', b'b', b'c']);
}

#[test]
fn header_and_payload_may_arrive_in_pieces() {
    let (a, b) = pair();
    a.write(&[0, 0, 0]).unwrap();
    a.write(&[5, b'h']).unwrap();
    a.write(b"ello").unwrap();

    let frame = b.read_with_length_prefix(PrefixWidth::U32).unwrap();
    assert_eq!(&frame[..], b"hello");
}

#[test]
fn timeout_mid_frame_keeps_frame_boundary() {
    let (a, b) = managed_pair(short_timeout_config()).unwrap();
    a.write(&[0, 5, b'h', b'e']).unwrap();

    let err = b.read_with_length_prefix(PrefixWidth::U16).unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(b.buffered(), 4);

    a.write(b"llo").unwrap();
    let frame = b.read_with_length_prefix(PrefixWidth::U16).unwrap();
    assert_eq!(&frame[..], b"hello");
}

#[test]
fn empty_frame() {
    let (a, b) = pair();
    a.write_with_length_prefix(b"", PrefixWidth::U32).unwrap();
    a.write_with_length_prefix(b"next", PrefixWidth::U32).unwrap();

    assert!(b.read_with_length_prefix(PrefixWidth::U32).unwrap().is_empty());
    assert_eq!(&b.read_with_length_prefix(PrefixWidth::U32).unwrap()[..], b"next");
}

#[test]
fn payload_too_long_for_width_is_not_sent() {
    let (a, b) = managed_pair(short_timeout_config()).unwrap();
    let payload = vec![0u8; 256];

    match a.write_with_length_prefix(&payload, PrefixWidth::U8) {
        Err(TransmissionError::ValueTooLarge { len, bits }) => {
            assert_eq!(len, 256);
            assert_eq!(bits, 8);
        }
        other => panic!("expected ValueTooLarge, got {other:?}"),
    }

    assert!(b.read_up_to(1).unwrap_err().is_timeout());
    a.write_with_length_prefix(&payload[..255], PrefixWidth::U8).unwrap();
    assert_eq!(b.read_with_length_prefix(PrefixWidth::U8).unwrap().len(), 255);
}

#[test]
fn unsupported_prefix_bits() {
    let (a, b) = pair();
    assert!(matches!(
        a.write_with_length_prefix_bits(b"x", 12),
        Err(TransmissionError::InvalidFrame(12))
    ));
    assert!(matches!(
        b.read_with_length_prefix_bits(0),
        Err(TransmissionError::InvalidFrame(0))
    ));

    a.write_with_length_prefix_bits(b"ok", 64).unwrap();
    assert_eq!(&b.read_with_length_prefix_bits(64).unwrap()[..], b"ok");
}

#[test]
fn declared_length_above_limit_is_rejected() {
    let config = ConnectionConfig::new()
        .with_read_timeout(TEST_TIMEOUT)
        .with_max_frame_len(4);
    let (a, b) = managed_pair(config).unwrap();

    a.write(&[0, 0, 0, 10]).unwrap();
    match b.read_with_length_prefix(PrefixWidth::U32) {
        Err(TransmissionError::FrameTooLarge { len, max }) => {
            assert_eq!(len, 10);
            assert_eq!(max, 4);
        }
        other => panic!("expected FrameTooLarge, got {other:?}"),
    }
}

#[test]
fn peer_close_inside_frame() {
    let (a, b) = pair();
    a.write(&[0, 8, b'p', b'a']).unwrap();
    drop(a);

    assert!(matches!(
        b.read_with_length_prefix(PrefixWidth::U16),
        Err(TransmissionError::ConnectionClosed)
    ));
}
