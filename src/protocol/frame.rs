//! Frame structures and the encode/decode implementation
//!
//! See the module documentation in `protocol` for the byte layout.

use super::{
    FormatError, CONTROL_FRAME_LEN, MAX_CHANNELS, TELEMETRY_HEADER_LEN, VALUE_LEN,
};

/// Outbound control frame: one analog level plus a toggle bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    /// Client wall clock, milliseconds since epoch
    pub timestamp_ms: u64,
    /// Per-session counter, +1 per send, never reset
    pub sequence: u32,
    /// Target node id
    pub node_id: u32,
    /// Analog level 0-100
    pub value: u32,
    /// Toggle bitmask
    pub switches: u32,
}

impl ControlFrame {
    /// Encode into the fixed 24-byte record
    pub fn encode(&self) -> [u8; CONTROL_FRAME_LEN] {
        let mut buf = [0u8; CONTROL_FRAME_LEN];
        buf[0..8].copy_from_slice(&self.timestamp_ms.to_le_bytes());
        buf[8..12].copy_from_slice(&self.sequence.to_le_bytes());
        buf[12..16].copy_from_slice(&self.node_id.to_le_bytes());
        buf[16..20].copy_from_slice(&self.value.to_le_bytes());
        buf[20..24].copy_from_slice(&self.switches.to_le_bytes());
        buf
    }

    /// Decode one control frame record
    ///
    /// The inverse of [`ControlFrame::encode`]; used by the mock gateway and
    /// by tests exercising the round-trip law.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() != CONTROL_FRAME_LEN {
            return Err(FormatError::ControlLength(bytes.len()));
        }
        Ok(Self {
            timestamp_ms: read_u64_le(bytes, 0),
            sequence: read_u32_le(bytes, 8),
            node_id: read_u32_le(bytes, 12),
            value: read_u32_le(bytes, 16),
            switches: read_u32_le(bytes, 20),
        })
    }
}

/// Inbound telemetry frame: one sample per channel
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    /// Producer-side wall clock, milliseconds since epoch
    pub timestamp_ms: u64,
    /// Source node id
    pub node_id: u32,
    /// One value per channel, channel index = position
    pub values: Vec<f64>,
}

impl TelemetryFrame {
    /// Encoded size of this frame in bytes
    pub fn encoded_len(&self) -> usize {
        TELEMETRY_HEADER_LEN + self.values.len() * VALUE_LEN
    }

    /// Append the encoded record to `out`
    ///
    /// Appending lets a producer pack several frames into one buffer, which
    /// is exactly what the decoder expects to receive.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.reserve(self.encoded_len());
        out.extend_from_slice(&self.timestamp_ms.to_le_bytes());
        out.extend_from_slice(&self.node_id.to_le_bytes());
        out.extend_from_slice(&(self.values.len() as u32).to_le_bytes());
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Encode into a fresh buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }
}

/// Decode a received buffer into the telemetry frames it contains
///
/// The buffer may hold one or many concatenated records; they are returned
/// in buffer order. Fails without returning partial frames if the buffer is
/// empty, ends mid-record, or declares an implausible channel count.
pub fn decode_telemetry(bytes: &[u8]) -> Result<Vec<TelemetryFrame>, FormatError> {
    if bytes.is_empty() {
        return Err(FormatError::Empty);
    }

    let mut frames = Vec::new();
    let mut rest = bytes;

    while !rest.is_empty() {
        if rest.len() < TELEMETRY_HEADER_LEN {
            return Err(FormatError::Truncated {
                remaining: rest.len(),
                needed: TELEMETRY_HEADER_LEN,
            });
        }

        let timestamp_ms = read_u64_le(rest, 0);
        let node_id = read_u32_le(rest, 8);
        let channels = read_u32_le(rest, 12);

        if channels > MAX_CHANNELS {
            return Err(FormatError::ChannelCount(channels));
        }

        let record_len = TELEMETRY_HEADER_LEN + channels as usize * VALUE_LEN;
        if rest.len() < record_len {
            return Err(FormatError::Truncated {
                remaining: rest.len(),
                needed: record_len,
            });
        }

        let mut values = Vec::with_capacity(channels as usize);
        for i in 0..channels as usize {
            values.push(read_f64_le(rest, TELEMETRY_HEADER_LEN + i * VALUE_LEN));
        }

        frames.push(TelemetryFrame {
            timestamp_ms,
            node_id,
            values,
        });
        rest = &rest[record_len..];
    }

    Ok(frames)
}

#[inline]
fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(b)
}

#[inline]
fn read_u64_le(buf: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(b)
}

#[inline]
fn read_f64_le(buf: &[u8], offset: usize) -> f64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[offset..offset + 8]);
    f64::from_le_bytes(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control() -> ControlFrame {
        ControlFrame {
            timestamp_ms: 1_700_000_000_123,
            sequence: 42,
            node_id: 3,
            value: 57,
            switches: 0b1011,
        }
    }

    #[test]
    fn test_control_layout() {
        let bytes = control().encode();

        assert_eq!(bytes.len(), CONTROL_FRAME_LEN);
        assert_eq!(bytes[0..8], 1_700_000_000_123u64.to_le_bytes());
        assert_eq!(bytes[8..12], 42u32.to_le_bytes());
        assert_eq!(bytes[12..16], 3u32.to_le_bytes());
        assert_eq!(bytes[16..20], 57u32.to_le_bytes());
        assert_eq!(bytes[20..24], 0b1011u32.to_le_bytes());
    }

    #[test]
    fn test_control_round_trip() {
        let frame = control();
        let decoded = ControlFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_control_wrong_length() {
        let bytes = control().encode();
        assert_eq!(
            ControlFrame::decode(&bytes[..23]),
            Err(FormatError::ControlLength(23))
        );
    }

    #[test]
    fn test_telemetry_round_trip() {
        let frame = TelemetryFrame {
            timestamp_ms: 100,
            node_id: 7,
            values: vec![1.5, -2.25, 0.0],
        };

        let decoded = decode_telemetry(&frame.encode()).unwrap();
        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn test_telemetry_layout() {
        let frame = TelemetryFrame {
            timestamp_ms: 0xAABBCCDD,
            node_id: 1,
            values: vec![2.0],
        };
        let bytes = frame.encode();

        // [timestamp 8][node_id 4][channels 4][value 8] = 24 bytes
        assert_eq!(bytes.len(), 24);
        assert_eq!(bytes[0..8], 0xAABBCCDDu64.to_le_bytes());
        assert_eq!(bytes[8..12], 1u32.to_le_bytes());
        assert_eq!(bytes[12..16], 1u32.to_le_bytes());
        assert_eq!(bytes[16..24], 2.0f64.to_le_bytes());
    }

    #[test]
    fn test_multi_frame_decode() {
        let frames: Vec<TelemetryFrame> = (0..4)
            .map(|i| TelemetryFrame {
                timestamp_ms: 100 * i as u64,
                node_id: i,
                values: vec![i as f64, -(i as f64)],
            })
            .collect();

        let mut buf = Vec::new();
        for f in &frames {
            f.encode_into(&mut buf);
        }

        let decoded = decode_telemetry(&buf).unwrap();
        assert_eq!(decoded, frames);
    }

    #[test]
    fn test_mixed_width_frames_in_one_buffer() {
        let narrow = TelemetryFrame {
            timestamp_ms: 1,
            node_id: 1,
            values: vec![1.0],
        };
        let wide = TelemetryFrame {
            timestamp_ms: 2,
            node_id: 1,
            values: vec![1.0, 2.0, 3.0],
        };

        let mut buf = narrow.encode();
        wide.encode_into(&mut buf);

        let decoded = decode_telemetry(&buf).unwrap();
        assert_eq!(decoded, vec![narrow, wide]);
    }

    #[test]
    fn test_empty_buffer_rejected() {
        assert_eq!(decode_telemetry(&[]), Err(FormatError::Empty));
    }

    #[test]
    fn test_partial_record_rejected() {
        let frame = TelemetryFrame {
            timestamp_ms: 5,
            node_id: 2,
            values: vec![1.0, 2.0],
        };
        let mut buf = frame.encode();
        buf.pop(); // buffer length no longer a multiple of the record size

        let err = decode_telemetry(&buf).unwrap_err();
        assert!(matches!(err, FormatError::Truncated { .. }));
    }

    #[test]
    fn test_trailing_bytes_reject_whole_buffer() {
        // One valid record followed by a dangling half header: decode must
        // not hand back the valid prefix.
        let frame = TelemetryFrame {
            timestamp_ms: 5,
            node_id: 2,
            values: vec![1.0],
        };
        let mut buf = frame.encode();
        buf.extend_from_slice(&[0u8; 7]);

        assert_eq!(
            decode_telemetry(&buf),
            Err(FormatError::Truncated {
                remaining: 7,
                needed: TELEMETRY_HEADER_LEN
            })
        );
    }

    #[test]
    fn test_implausible_channel_count_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&77u64.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(MAX_CHANNELS + 1).to_le_bytes());

        assert_eq!(
            decode_telemetry(&buf),
            Err(FormatError::ChannelCount(MAX_CHANNELS + 1))
        );
    }

    #[test]
    fn test_zero_channel_frame() {
        // A heartbeat-style frame with no values is well-formed.
        let frame = TelemetryFrame {
            timestamp_ms: 9,
            node_id: 4,
            values: vec![],
        };
        let decoded = decode_telemetry(&frame.encode()).unwrap();
        assert_eq!(decoded, vec![frame]);
    }
}
