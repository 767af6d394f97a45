//! Binary frame codec for the gateway link
//!
//! # Wire Format Specification
//!
//! All integer and floating-point fields are little-endian. The same layout
//! is used on the encode and decode paths, so `decode(encode(frame))`
//! reproduces the original field values losslessly.
//!
//! ## Control frame (client -> gateway, fixed 24 bytes)
//!
//! ```text
//! ┌──────────────┬──────────┬─────────┬─────────┬──────────┐
//! │ timestamp_ms │ sequence │ node_id │ value   │ switches │
//! │ u64 LE       │ u32 LE   │ u32 LE  │ u32 LE  │ u32 LE   │
//! └──────────────┴──────────┴─────────┴─────────┴──────────┘
//! ```
//!
//! - `timestamp_ms`: client wall clock, milliseconds since epoch
//! - `sequence`: strictly increasing per session, starting at 0
//! - `node_id`: target node
//! - `value`: analog level 0-100
//! - `switches`: toggle bitmask, bit i = toggle i
//!
//! ## Telemetry frame (gateway -> client, 16-byte header + 8 bytes/channel)
//!
//! ```text
//! ┌──────────────┬─────────┬──────────┬──────────────────────┐
//! │ timestamp_ms │ node_id │ channels │ values               │
//! │ u64 LE       │ u32 LE  │ u32 LE   │ channels × f64 LE    │
//! └──────────────┴─────────┴──────────┴──────────────────────┘
//! ```
//!
//! A received buffer may contain several telemetry frames back to back; the
//! decoder keeps consuming records until the buffer is exhausted. A buffer
//! that ends mid-record is a protocol mismatch and fails as a whole - no
//! partial frames are ever returned.

mod frame;

pub use frame::{decode_telemetry, ControlFrame, TelemetryFrame};

/// Size of an encoded control frame
pub const CONTROL_FRAME_LEN: usize = 24;

/// Size of a telemetry frame header (timestamp + node id + channel count)
pub const TELEMETRY_HEADER_LEN: usize = 16;

/// Size of one encoded channel value
pub const VALUE_LEN: usize = 8;

/// Sanity cap on the declared channel count of a telemetry frame
///
/// A count above this is treated as a protocol mismatch rather than an
/// instruction to allocate; real nodes carry a handful of channels.
pub const MAX_CHANNELS: u32 = 256;

/// Malformed frame buffer
///
/// Raised by the decode paths only. Indicates a transport or protocol
/// mismatch that the caller must surface; decoding is never retried or
/// partially recovered internally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The received buffer contained no bytes at all
    #[error("empty frame buffer")]
    Empty,

    /// The buffer ended before a complete record
    #[error("truncated frame: {remaining} bytes left, {needed} needed")]
    Truncated { remaining: usize, needed: usize },

    /// Declared channel count above [`MAX_CHANNELS`]
    #[error("channel count {0} exceeds limit of {max}", max = MAX_CHANNELS)]
    ChannelCount(u32),

    /// A control frame record has exactly [`CONTROL_FRAME_LEN`] bytes
    #[error("control frame must be {expected} bytes, got {0}", expected = CONTROL_FRAME_LEN)]
    ControlLength(usize),
}
