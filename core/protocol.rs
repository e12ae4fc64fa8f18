// Length-prefix framing - pure encoding, no I/O
//
// Wire format: [length: N-bit big-endian unsigned][payload: length bytes]
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TransmissionError};
use crate::types::PrefixWidth;

/// Encode `len` as a big-endian length field of the given width.
pub fn encode_length(len: usize, width: PrefixWidth) -> Result<Vec<u8>> {
    let len = len as u64;
    if len > width.max_len() {
        return Err(TransmissionError::ValueTooLarge {
            len,
            bits: width.bits(),
        });
    }

    let mut field = Vec::with_capacity(width.bytes());
    match width {
        PrefixWidth::U8 => field.push(len as u8),
        PrefixWidth::U16 => field.extend_from_slice(&(len as u16).to_be_bytes()),
        PrefixWidth::U32 => field.extend_from_slice(&(len as u32).to_be_bytes()),
        PrefixWidth::U64 => field.extend_from_slice(&len.to_be_bytes()),
    }
    Ok(field)
}

/// Decode a big-endian length field. `field` must be exactly `width.bytes()` long.
pub fn decode_length(field: &[u8], width: PrefixWidth) -> Result<u64> {
    if field.len() != width.bytes() {
        return Err(TransmissionError::InvalidArgument(format!(
            "{} length field needs {} bytes, got {}",
            width,
            width.bytes(),
            field.len()
        )));
    }

    let mut value = 0u64;
    for byte in field {
        value = (value << 8) | u64::from(*byte);
    }
    Ok(value)
}

/// Build the complete frame (length field followed by payload) in one buffer,
/// so it can be handed to the backend as a single write.
pub fn encode_frame(payload: &[u8], width: PrefixWidth) -> Result<Bytes> {
    let field = encode_length(payload.len(), width)?;
    let mut frame = BytesMut::with_capacity(field.len() + payload.len());
    frame.put_slice(&field);
    frame.put_slice(payload);
    Ok(frame.freeze())
}

/// Convert a decoded length to an in-memory size, enforcing an optional cap.
pub fn checked_frame_len(len: u64, width: PrefixWidth, max: Option<u64>) -> Result<usize> {
    if let Some(max) = max {
        if len > max {
            return Err(TransmissionError::FrameTooLarge { len, max });
        }
    }
    usize::try_from(len).map_err(|_| TransmissionError::ValueTooLarge {
        len,
        bits: width.bits(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_fields_are_big_endian() {
        assert_eq!(encode_length(4, PrefixWidth::U8).unwrap(), vec![4]);
        assert_eq!(encode_length(0x0102, PrefixWidth::U16).unwrap(), vec![1, 2]);
        assert_eq!(
            encode_length(0x0102_0304, PrefixWidth::U32).unwrap(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(
            encode_length(5, PrefixWidth::U64).unwrap(),
            vec![0, 0, 0, 0, 0, 0, 0, 5]
        );
    }

    #[test]
    fn length_must_fit_width() {
        assert!(encode_length(255, PrefixWidth::U8).is_ok());
        assert!(matches!(
            encode_length(256, PrefixWidth::U8),
            Err(TransmissionError::ValueTooLarge { len: 256, bits: 8 })
        ));
        assert!(matches!(
            encode_length(65_536, PrefixWidth::U16),
            Err(TransmissionError::ValueTooLarge { bits: 16, .. })
        ));
    }

    #[test]
    fn decode_reads_network_order() {
        assert_eq!(decode_length(&[0x01, 0x00], PrefixWidth::U16).unwrap(), 256);
        assert_eq!(
            decode_length(&[0xff; 8], PrefixWidth::U64).unwrap(),
            u64::MAX
        );
        assert!(decode_length(&[0x01], PrefixWidth::U16).is_err());
    }

    #[test]
    fn frame_is_prefix_then_payload() {
        let frame = encode_frame(b"test", PrefixWidth::U16).unwrap();
        assert_eq!(&frame[..], b"\x00\x04test");

        let empty = encode_frame(b"", PrefixWidth::U32).unwrap();
        assert_eq!(&empty[..], &[0, 0, 0, 0]);
    }

    #[test]
    fn frame_len_respects_cap() {
        assert_eq!(checked_frame_len(10, PrefixWidth::U32, Some(10)).unwrap(), 10);
        assert!(matches!(
            checked_frame_len(11, PrefixWidth::U32, Some(10)),
            Err(TransmissionError::FrameTooLarge { len: 11, max: 10 })
        ));
    }
}
