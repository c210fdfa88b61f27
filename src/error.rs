//! Error types for frame decoding, record lookup, and configuration.
//!
//! None of these cross a component boundary at runtime: the decoder turns a
//! [`DecodeError`] into a logged bad read, record stores turn a
//! [`RecordError`] into a lookup outcome, and [`ConfigError`] is only
//! returned from [`Config::validate`](crate::config::Config::validate) at
//! startup.

use thiserror::Error;

/// Why a completed Wiegand frame could not be turned into a card read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The frame length does not match any supported card format.
    #[error("unsupported frame length: {bits} bits")]
    UnsupportedLength {
        /// Number of bits received.
        bits: usize,
    },

    /// A 4- or 8-bit keypad frame. Pin-code entry is not supported.
    #[error("keypad frame ({bits} bits) ignored, pin entry unsupported")]
    Keypress {
        /// Number of bits received.
        bits: usize,
    },

    /// Leading or trailing parity bit did not match the payload.
    #[error("parity mismatch in {bits}-bit frame")]
    Parity {
        /// Number of bits received.
        bits: usize,
    },

    /// More edges arrived than the capture buffer holds; the frame was
    /// clamped and its contents are meaningless.
    #[error("frame overflowed the {max}-bit capture buffer")]
    Overflow {
        /// Capture buffer size in bits.
        max: usize,
    },

    /// Facility code decoded as zero, which readers emit on a bad read.
    #[error("facility code was zero")]
    ZeroFacility,
}

/// Failure classifying a locally stored user record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record exists but could not be parsed.
    #[error("record is malformed")]
    Malformed,

    /// The backing storage could not be read.
    #[error("record storage read failed")]
    Io,
}

/// Configuration rejected at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A timing value is zero or otherwise out of range.
    #[error("invalid timing value for `{field}`")]
    InvalidTiming {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The same GPIO is assigned to more than one function.
    #[error("GPIO {pin} assigned more than once")]
    DuplicatePin {
        /// The duplicated pin number.
        pin: u8,
    },

    /// No lock relay is configured, so the door can never be released.
    #[error("no lock relay configured")]
    MissingLockRelay,
}
