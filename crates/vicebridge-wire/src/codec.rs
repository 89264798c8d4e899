use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WireError};
use crate::protocol::{IdWidth, WireFormat};

/// Start-of-frame marker, shared by every protocol generation.
pub const STX: u8 = 0x02;

/// Default maximum body size: 16 MiB (display dumps are the largest bodies).
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// One complete response frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Response type tag. Mirrors the command code for direct replies.
    pub kind: u8,
    /// Peer status byte; see [`crate::status`].
    pub status: u8,
    /// Request id this frame answers, or the async sentinel.
    pub request_id: u32,
    pub body: Bytes,
}

/// One complete request frame, as a peer would parse it.
///
/// The client never decodes requests; this exists for the mock peers the
/// test suites run against, and keeps the codec symmetric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: u8,
    pub request_id: u32,
    pub body: Bytes,
}

/// Wire size of a request header for the given format.
pub const fn request_header_len(format: &WireFormat) -> usize {
    // STX + version + body length + id + command
    6 + format.id_width.bytes() + 1
}

/// Wire size of a response header for the given format.
pub const fn response_header_len(format: &WireFormat) -> usize {
    // STX + version + body length + id + kind + status
    6 + format.id_width.bytes() + 2
}

/// Encode a request frame into `dst`.
///
/// Wire layout:
/// ```text
/// STX(1) | VERSION(1) | BODY_LEN(4 LE) | REQUEST_ID(1|4 LE) | COMMAND(1) | BODY
/// ```
pub fn encode_request(
    format: &WireFormat,
    command: u8,
    request_id: u32,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    check_id(format, request_id)?;
    if body.len() > u32::MAX as usize {
        return Err(WireError::BodyTooLarge {
            size: body.len(),
            max: u32::MAX as usize,
        });
    }
    dst.reserve(request_header_len(format) + body.len());
    dst.put_u8(STX);
    dst.put_u8(format.api_version);
    dst.put_u32_le(body.len() as u32);
    put_id(format, request_id, dst);
    dst.put_u8(command);
    dst.put_slice(body);
    Ok(())
}

/// Encode a response frame into `dst`.
///
/// The kind/status pair sits before or after the request id depending on
/// the format's `status_before_id` flag; see [`WireFormat`].
pub fn encode_response(
    format: &WireFormat,
    kind: u8,
    status: u8,
    request_id: u32,
    body: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    check_id(format, request_id)?;
    dst.reserve(response_header_len(format) + body.len());
    dst.put_u8(STX);
    dst.put_u8(format.api_version);
    dst.put_u32_le(body.len() as u32);
    if format.status_before_id {
        dst.put_u8(kind);
        dst.put_u8(status);
        put_id(format, request_id, dst);
    } else {
        put_id(format, request_id, dst);
        dst.put_u8(kind);
        dst.put_u8(status);
    }
    dst.put_slice(body);
    Ok(())
}

/// Decode the next complete response frame from `src`.
///
/// Returns `Ok(None)` until a complete frame is buffered; on success the
/// frame's bytes are consumed from `src`. Bytes that cannot start a frame
/// are dropped one at a time until a start marker lines up again, so a
/// corrupted stream resynchronizes instead of wedging. The loop always
/// either consumes input or returns, so it terminates.
pub fn decode_response(
    src: &mut BytesMut,
    format: &WireFormat,
    max_body: usize,
) -> Result<Option<Frame>> {
    let header_len = response_header_len(format);
    loop {
        if src.is_empty() {
            return Ok(None);
        }
        if src[0] != STX {
            src.advance(1);
            continue;
        }
        if src.len() < header_len {
            return Ok(None);
        }
        if src[1] != format.api_version {
            return Err(WireError::VersionMismatch {
                expected: format.api_version,
                found: src[1],
            });
        }
        let body_len = read_body_len(src);
        if body_len > max_body {
            return Err(WireError::BodyTooLarge {
                size: body_len,
                max: max_body,
            });
        }
        if src.len() < header_len + body_len {
            return Ok(None);
        }

        let (kind, status, request_id) = if format.status_before_id {
            let kind = src[6];
            let status = src[7];
            let id = read_id(format, src, 8);
            (kind, status, id)
        } else {
            let id = read_id(format, src, 6);
            let kind = src[6 + format.id_width.bytes()];
            let status = src[7 + format.id_width.bytes()];
            (kind, status, id)
        };

        src.advance(header_len);
        let body = src.split_to(body_len).freeze();
        return Ok(Some(Frame {
            kind,
            status,
            request_id,
            body,
        }));
    }
}

/// Decode the next complete request frame from `src` (mock-peer side).
pub fn decode_request(
    src: &mut BytesMut,
    format: &WireFormat,
    max_body: usize,
) -> Result<Option<Request>> {
    let header_len = request_header_len(format);
    loop {
        if src.is_empty() {
            return Ok(None);
        }
        if src[0] != STX {
            src.advance(1);
            continue;
        }
        if src.len() < header_len {
            return Ok(None);
        }
        if src[1] != format.api_version {
            return Err(WireError::VersionMismatch {
                expected: format.api_version,
                found: src[1],
            });
        }
        let body_len = read_body_len(src);
        if body_len > max_body {
            return Err(WireError::BodyTooLarge {
                size: body_len,
                max: max_body,
            });
        }
        if src.len() < header_len + body_len {
            return Ok(None);
        }

        let request_id = read_id(format, src, 6);
        let command = src[6 + format.id_width.bytes()];

        src.advance(header_len);
        let body = src.split_to(body_len).freeze();
        return Ok(Some(Request {
            command,
            request_id,
            body,
        }));
    }
}

fn check_id(format: &WireFormat, request_id: u32) -> Result<()> {
    if request_id > format.id_width.max_id() {
        return Err(WireError::RequestIdOutOfRange {
            id: request_id,
            width: format.id_width.bytes(),
        });
    }
    Ok(())
}

fn put_id(format: &WireFormat, request_id: u32, dst: &mut BytesMut) {
    match format.id_width {
        IdWidth::U8 => dst.put_u8(request_id as u8),
        IdWidth::U32 => dst.put_u32_le(request_id),
    }
}

fn read_id(format: &WireFormat, src: &[u8], offset: usize) -> u32 {
    match format.id_width {
        IdWidth::U8 => src[offset] as u32,
        IdWidth::U32 => u32::from_le_bytes([
            src[offset],
            src[offset + 1],
            src[offset + 2],
            src[offset + 3],
        ]),
    }
}

fn read_body_len(src: &[u8]) -> usize {
    u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ProtocolVersion;

    fn formats() -> Vec<WireFormat> {
        vec![
            ProtocolVersion::v1().wire,
            ProtocolVersion::v2().wire,
            ProtocolVersion::v3().wire,
        ]
    }

    #[test]
    fn request_roundtrip_all_generations() {
        for format in formats() {
            let mut wire = BytesMut::new();
            encode_request(&format, 0x31, 0x2a, b"\x00\x01", &mut wire).unwrap();

            let request = decode_request(&mut wire, &format, DEFAULT_MAX_BODY)
                .unwrap()
                .unwrap();
            assert_eq!(request.command, 0x31);
            assert_eq!(request.request_id, 0x2a);
            assert_eq!(request.body.as_ref(), b"\x00\x01");
            assert!(wire.is_empty());
        }
    }

    #[test]
    fn response_roundtrip_all_generations() {
        for format in formats() {
            let mut wire = BytesMut::new();
            encode_response(&format, 0x01, 0x00, 7, b"payload", &mut wire).unwrap();

            let frame = decode_response(&mut wire, &format, DEFAULT_MAX_BODY)
                .unwrap()
                .unwrap();
            assert_eq!(frame.kind, 0x01);
            assert_eq!(frame.status, 0x00);
            assert_eq!(frame.request_id, 7);
            assert_eq!(frame.body.as_ref(), b"payload");
            assert!(wire.is_empty());
        }
    }

    #[test]
    fn zero_length_body_is_valid() {
        let format = ProtocolVersion::v2().wire;
        let mut wire = BytesMut::new();
        encode_response(&format, 0xaa, 0x00, 1, b"", &mut wire).unwrap();

        let frame = decode_response(&mut wire, &format, DEFAULT_MAX_BODY)
            .unwrap()
            .unwrap();
        assert!(frame.body.is_empty());
    }

    #[test]
    fn partial_header_waits_for_more() {
        let format = ProtocolVersion::v2().wire;
        let mut wire = BytesMut::new();
        encode_response(&format, 0x01, 0x00, 1, b"abc", &mut wire).unwrap();
        let full = wire.clone();

        // Every split point, including mid-header, must first yield None
        // and then the identical frame once the remainder arrives.
        for split in 1..full.len() {
            let mut buf = BytesMut::from(&full[..split]);
            assert!(decode_response(&mut buf, &format, DEFAULT_MAX_BODY)
                .unwrap()
                .is_none());
            buf.extend_from_slice(&full[split..]);
            let frame = decode_response(&mut buf, &format, DEFAULT_MAX_BODY)
                .unwrap()
                .unwrap();
            assert_eq!(frame.body.as_ref(), b"abc");
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn two_frames_in_one_chunk_decode_in_order() {
        let format = ProtocolVersion::v2().wire;
        let mut wire = BytesMut::new();
        encode_response(&format, 0x01, 0x00, 1, b"first", &mut wire).unwrap();
        encode_response(&format, 0x02, 0x00, 2, b"second", &mut wire).unwrap();

        let f1 = decode_response(&mut wire, &format, DEFAULT_MAX_BODY)
            .unwrap()
            .unwrap();
        let f2 = decode_response(&mut wire, &format, DEFAULT_MAX_BODY)
            .unwrap()
            .unwrap();
        assert_eq!(f1.body.as_ref(), b"first");
        assert_eq!(f2.body.as_ref(), b"second");
        assert!(wire.is_empty());
    }

    #[test]
    fn garbage_byte_before_frame_is_dropped() {
        let format = ProtocolVersion::v2().wire;
        let mut wire = BytesMut::new();
        wire.put_u8(0x99);
        encode_response(&format, 0x01, 0x00, 1, b"ok", &mut wire).unwrap();

        let frame = decode_response(&mut wire, &format, DEFAULT_MAX_BODY)
            .unwrap()
            .unwrap();
        assert_eq!(frame.body.as_ref(), b"ok");
        assert!(wire.is_empty());
    }

    #[test]
    fn resync_consumes_pure_garbage_without_looping() {
        let format = ProtocolVersion::v2().wire;
        let mut wire = BytesMut::from(&[0xde, 0xad, 0xbe, 0xef][..]);
        assert!(decode_response(&mut wire, &format, DEFAULT_MAX_BODY)
            .unwrap()
            .is_none());
        assert!(wire.is_empty());
    }

    #[test]
    fn version_mismatch_is_an_error() {
        let v2 = ProtocolVersion::v2().wire;
        let v3 = ProtocolVersion::v3().wire;
        let mut wire = BytesMut::new();
        encode_response(&v3, 0x01, 0x00, 1, b"", &mut wire).unwrap();

        let err = decode_response(&mut wire, &v2, DEFAULT_MAX_BODY).unwrap_err();
        assert!(matches!(
            err,
            WireError::VersionMismatch {
                expected: 0x02,
                found: 0x03
            }
        ));
    }

    #[test]
    fn oversized_body_is_rejected() {
        let format = ProtocolVersion::v2().wire;
        let mut wire = BytesMut::new();
        wire.put_u8(STX);
        wire.put_u8(format.api_version);
        wire.put_u32_le(1024 * 1024);
        wire.put_u8(0x01);
        wire.put_u8(0x00);
        wire.put_u32_le(1);

        let err = decode_response(&mut wire, &format, 4096).unwrap_err();
        assert!(matches!(err, WireError::BodyTooLarge { .. }));
    }

    #[test]
    fn request_id_must_fit_the_field() {
        let format = ProtocolVersion::v1().wire;
        let mut wire = BytesMut::new();
        let err = encode_request(&format, 0x01, 0x100, b"", &mut wire).unwrap_err();
        assert!(matches!(err, WireError::RequestIdOutOfRange { .. }));
    }

    #[test]
    fn v1_layout_places_id_before_status() {
        let format = ProtocolVersion::v1().wire;
        let mut wire = BytesMut::new();
        encode_response(&format, 0x21, 0x01, 0x42, b"", &mut wire).unwrap();

        // STX, version, 4-byte length, then id, kind, status.
        assert_eq!(wire[6], 0x42);
        assert_eq!(wire[7], 0x21);
        assert_eq!(wire[8], 0x01);
    }
}
