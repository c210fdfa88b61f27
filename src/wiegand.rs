//! Wiegand card-reader decoding.
//!
//! Split in two halves that share one [`EdgeCapture`]:
//!
//! - The interrupt side calls [`EdgeCapture::on_edge`] on every falling edge
//!   of D0 or D1. It only filters bounce and appends a bit.
//! - The main loop calls [`WiegandReader::poll`]. Once the lines have been
//!   quiet long enough it marks the capture idle, snapshots and resets the
//!   frame, and decodes it into a [`WiegandRead`].
//!
//! All shared state is atomics, so `EdgeCapture` can live in a `static` and
//! be touched from an ISR without a critical section.
//!
//! # Example
//!
//! ```rust
//! use rs_doorman::config::ReaderConfig;
//! use rs_doorman::wiegand::{DataLine, EdgeCapture, WiegandReader};
//!
//! static CAPTURE: EdgeCapture = EdgeCapture::new();
//! let mut reader = WiegandReader::new(&CAPTURE, ReaderConfig::default());
//!
//! // Nothing captured yet
//! assert!(reader.poll(0, 0).is_none());
//!
//! CAPTURE.on_edge(DataLine::One, 10_000, 10);
//! // Still within the frame window
//! assert!(reader.poll(11_000, 11).is_none());
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::config::ReaderConfig;
use crate::error::DecodeError;
use crate::record::{Credential, CredentialRadix};

/// Capacity of the capture buffer. Longer bursts are clamped.
pub const MAX_READ_BITS: usize = 100;

/// Default minimum spacing between accepted edges, in microseconds.
pub const DEFAULT_MIN_EDGE_US: u32 = 2100;

/// Which data line produced an edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DataLine {
    /// D0 pulled low: a `0` bit.
    Zero,
    /// D1 pulled low: a `1` bit.
    One,
}

impl DataLine {
    fn bit(self) -> u8 {
        match self {
            DataLine::Zero => 0,
            DataLine::One => 1,
        }
    }
}

// ============================================================================
// Interrupt side
// ============================================================================

/// Edge buffer shared between the data-line interrupts and the poll loop.
pub struct EdgeCapture {
    bits: [AtomicU8; MAX_READ_BITS],
    count: AtomicUsize,
    last_edge_us: AtomicU32,
    last_edge_ms: AtomicU32,
    min_edge_us: AtomicU32,
    idle: AtomicBool,
    overflowed: AtomicBool,
}

impl Default for EdgeCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeCapture {
    /// Create an empty, idle capture.
    pub const fn new() -> Self {
        Self {
            bits: [const { AtomicU8::new(0) }; MAX_READ_BITS],
            count: AtomicUsize::new(0),
            last_edge_us: AtomicU32::new(0),
            last_edge_ms: AtomicU32::new(0),
            min_edge_us: AtomicU32::new(DEFAULT_MIN_EDGE_US),
            idle: AtomicBool::new(true),
            overflowed: AtomicBool::new(false),
        }
    }

    /// Set the bounce filter interval.
    pub fn set_min_edge_us(&self, min_edge_us: u32) {
        self.min_edge_us.store(min_edge_us, Ordering::Relaxed);
    }

    /// Record a falling edge on `line`.
    ///
    /// Safe to call from interrupt context: no allocation, no locking. The
    /// edge is dropped as bounce unless the capture is idle or more than
    /// the minimum interval has passed since the last accepted edge.
    pub fn on_edge(&self, line: DataLine, now_us: u32, now_ms: u64) {
        let idle = self.idle.load(Ordering::Acquire);
        let last = self.last_edge_us.load(Ordering::Relaxed);
        let min = self.min_edge_us.load(Ordering::Relaxed);
        if !idle && now_us.wrapping_sub(last) <= min {
            return;
        }

        let n = self.count.load(Ordering::Relaxed);
        let idx = if n >= MAX_READ_BITS {
            self.overflowed.store(true, Ordering::Relaxed);
            MAX_READ_BITS - 1
        } else {
            n
        };
        self.bits[idx].store(line.bit(), Ordering::Relaxed);
        self.count.store(idx + 1, Ordering::Release);

        self.last_edge_us.store(now_us, Ordering::Relaxed);
        self.last_edge_ms.store(now_ms as u32, Ordering::Relaxed);
        self.idle.store(false, Ordering::Release);
    }

    /// Number of bits currently buffered.
    pub fn bit_count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Returns true while no frame is in progress.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    /// Drop any partial frame and return to idle.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
        self.overflowed.store(false, Ordering::Relaxed);
        self.idle.store(true, Ordering::Release);
    }
}

// ============================================================================
// Decoded frame
// ============================================================================

/// A successfully decoded card presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WiegandRead {
    /// Frame length in bits.
    pub bit_count: usize,
    /// Facility (site) code.
    pub facility_code: u32,
    /// Card number within the facility.
    pub card_code: u32,
    /// Width of the card-number field for this format.
    pub card_bits: u8,
}

/// Field layout of one supported frame length.
struct Format {
    bits: usize,
    facility_bits: usize,
    card_bits: usize,
}

const FORMATS: [Format; 3] = [
    // H10301
    Format { bits: 26, facility_bits: 8, card_bits: 16 },
    Format { bits: 34, facility_bits: 16, card_bits: 16 },
    // H10304
    Format { bits: 37, facility_bits: 16, card_bits: 19 },
];

fn field(bits: &[u8]) -> u32 {
    bits.iter().fold(0u32, |acc, &b| (acc << 1) | u32::from(b & 1))
}

fn ones(bits: &[u8]) -> usize {
    bits.iter().filter(|&&b| b & 1 == 1).count()
}

impl WiegandRead {
    /// Decode a complete frame, one bit per element, first bit first.
    ///
    /// The first bit is even parity over the leading half of the payload,
    /// the last bit odd parity over the trailing half.
    pub fn decode(bits: &[u8], check_parity: bool) -> Result<Self, DecodeError> {
        let n = bits.len();
        if n == 4 || n == 8 {
            return Err(DecodeError::Keypress { bits: n });
        }
        let format = FORMATS
            .iter()
            .find(|f| f.bits == n)
            .ok_or(DecodeError::UnsupportedLength { bits: n })?;

        if check_parity {
            let half = (n - 1) / 2;
            let even_ok = ones(&bits[..=half]) % 2 == 0;
            let odd_ok = ones(&bits[n - 1 - half..]) % 2 == 1;
            if !even_ok || !odd_ok {
                return Err(DecodeError::Parity { bits: n });
            }
        }

        let payload = &bits[1..n - 1];
        let facility_code = field(&payload[..format.facility_bits]);
        let card_code = field(&payload[format.facility_bits..]);
        if facility_code == 0 {
            return Err(DecodeError::ZeroFacility);
        }

        Ok(Self {
            bit_count: n,
            facility_code,
            card_code,
            card_bits: format.card_bits as u8,
        })
    }

    /// Combined numeric code: facility above the card field.
    pub fn code(&self) -> u64 {
        (u64::from(self.facility_code) << self.card_bits) | u64::from(self.card_code)
    }

    /// Lookup key for this read.
    pub fn credential(&self, radix: CredentialRadix) -> Credential {
        radix.encode(self.code())
    }
}

// ============================================================================
// Poll side
// ============================================================================

/// Main-loop half of the decoder.
pub struct WiegandReader<'a> {
    capture: &'a EdgeCapture,
    config: ReaderConfig,
}

impl<'a> WiegandReader<'a> {
    /// Bind a reader to `capture` and apply the bounce filter setting.
    pub fn new(capture: &'a EdgeCapture, config: ReaderConfig) -> Self {
        capture.set_min_edge_us(config.min_edge_us);
        Self { capture, config }
    }

    /// Reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Check for a completed frame.
    ///
    /// Returns `Some` exactly once per frame, after the lines have been
    /// quiet for `idle_factor * min_edge_us` or `frame_wait_ms`. Quiet time
    /// is measured in both clocks so a wrap of the microsecond counter
    /// cannot stall or split a frame.
    pub fn poll(&mut self, now_us: u32, now_ms: u64) -> Option<Result<WiegandRead, DecodeError>> {
        let capture = self.capture;
        if !capture.is_idle() {
            let last_us = capture.last_edge_us.load(Ordering::Relaxed);
            let last_ms = capture.last_edge_ms.load(Ordering::Relaxed);
            let quiet_us = now_us.wrapping_sub(last_us);
            let quiet_ms = (now_ms as u32).wrapping_sub(last_ms);
            let idle_us = self.config.min_edge_us.saturating_mul(self.config.idle_factor);
            if quiet_us <= idle_us && quiet_ms <= self.config.frame_wait_ms {
                return None;
            }
            capture.idle.store(true, Ordering::Release);
        }

        let n = capture.count.load(Ordering::Acquire);
        if n == 0 {
            return None;
        }

        let mut frame = [0u8; MAX_READ_BITS];
        for (dst, src) in frame.iter_mut().zip(&capture.bits[..n]) {
            *dst = src.load(Ordering::Relaxed);
        }
        let overflowed = capture.overflowed.load(Ordering::Relaxed);

        // A failed exchange means an edge landed after the snapshot; let
        // the next poll pick up the longer frame
        if capture
            .count
            .compare_exchange(n, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        capture.overflowed.store(false, Ordering::Relaxed);

        let result = if overflowed {
            Err(DecodeError::Overflow { max: MAX_READ_BITS })
        } else {
            WiegandRead::decode(&frame[..n], self.config.check_parity)
        };
        match &result {
            Ok(read) => log::debug!(
                "wiegand: {} bits, facility {} card {}",
                read.bit_count,
                read.facility_code,
                read.card_code
            ),
            Err(e) => log::warn!("wiegand: bad read: {}", e),
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a frame with correct parity around `facility`/`card`.
    fn frame(format_bits: usize, facility: u32, card: u32) -> heapless::Vec<u8, MAX_READ_BITS> {
        let format = FORMATS.iter().find(|f| f.bits == format_bits).unwrap();
        let mut bits: heapless::Vec<u8, MAX_READ_BITS> = heapless::Vec::new();
        bits.push(0).unwrap();
        for i in (0..format.facility_bits).rev() {
            bits.push(((facility >> i) & 1) as u8).unwrap();
        }
        for i in (0..format.card_bits).rev() {
            bits.push(((card >> i) & 1) as u8).unwrap();
        }
        bits.push(0).unwrap();
        let n = bits.len();
        let half = (n - 1) / 2;
        bits[0] = (ones(&bits[1..=half]) % 2) as u8;
        bits[n - 1] = ((ones(&bits[n - 1 - half..n - 1]) + 1) % 2) as u8;
        bits
    }

    // ========================================================================
    // Frame decoding
    // ========================================================================

    #[test]
    fn decode_26_bit() {
        let bits = frame(26, 128, 12345);
        let read = WiegandRead::decode(&bits, true).unwrap();
        assert_eq!(read.facility_code, 128);
        assert_eq!(read.card_code, 12345);
        assert_eq!(read.code(), (128 << 16) | 12345);
        assert_eq!(read.credential(CredentialRadix::Decimal).as_str(), "8400953");
    }

    #[test]
    fn decode_34_and_37_bit() {
        let read = WiegandRead::decode(&frame(34, 4000, 65000), true).unwrap();
        assert_eq!((read.facility_code, read.card_code), (4000, 65000));

        let read = WiegandRead::decode(&frame(37, 300, 500_000), true).unwrap();
        assert_eq!((read.facility_code, read.card_code), (300, 500_000));
        assert_eq!(read.card_bits, 19);
    }

    #[test]
    fn decode_rejects_bad_parity() {
        let mut bits = frame(26, 128, 12345);
        bits[0] ^= 1;
        assert_eq!(WiegandRead::decode(&bits, true), Err(DecodeError::Parity { bits: 26 }));
        // Parity check disabled
        assert!(WiegandRead::decode(&bits, false).is_ok());

        let mut bits = frame(26, 128, 12345);
        bits[25] ^= 1;
        assert_eq!(WiegandRead::decode(&bits, true), Err(DecodeError::Parity { bits: 26 }));
    }

    #[test]
    fn decode_rejects_keypad_and_odd_lengths() {
        assert_eq!(WiegandRead::decode(&[0; 4], true), Err(DecodeError::Keypress { bits: 4 }));
        assert_eq!(WiegandRead::decode(&[0; 8], true), Err(DecodeError::Keypress { bits: 8 }));
        assert_eq!(
            WiegandRead::decode(&[1; 25], true),
            Err(DecodeError::UnsupportedLength { bits: 25 })
        );
    }

    #[test]
    fn decode_rejects_zero_facility() {
        let bits = frame(26, 0, 777);
        assert_eq!(WiegandRead::decode(&bits, true), Err(DecodeError::ZeroFacility));
    }

    // ========================================================================
    // Capture
    // ========================================================================

    #[test]
    fn bounce_filter() {
        let capture = EdgeCapture::new();
        capture.on_edge(DataLine::One, 0, 0);
        capture.on_edge(DataLine::Zero, 500, 0);
        assert_eq!(capture.bit_count(), 1);
        capture.on_edge(DataLine::Zero, 3000, 3);
        assert_eq!(capture.bit_count(), 2);
        assert!(!capture.is_idle());
    }

    #[test]
    fn overflow_clamps_count() {
        let capture = EdgeCapture::new();
        let mut t = 0u32;
        for _ in 0..MAX_READ_BITS + 5 {
            capture.on_edge(DataLine::One, t, u64::from(t / 1000));
            t += 3000;
        }
        assert_eq!(capture.bit_count(), MAX_READ_BITS);
        assert!(capture.overflowed.load(Ordering::Relaxed));
    }

    #[test]
    fn overflowed_frame_reported_as_overflow() {
        let capture = EdgeCapture::new();
        let mut reader = WiegandReader::new(&capture, ReaderConfig::default());
        let mut t = 0u32;
        for _ in 0..MAX_READ_BITS + 5 {
            capture.on_edge(DataLine::One, t, u64::from(t / 1000));
            t += 3000;
        }

        let last_ms = u64::from((t - 3000) / 1000);
        assert_eq!(
            reader.poll(t + 100_000, last_ms + 100),
            Some(Err(DecodeError::Overflow { max: MAX_READ_BITS }))
        );
        assert!(!capture.overflowed.load(Ordering::Relaxed));

        // Nothing left over for the next poll
        assert_eq!(reader.poll(t + 200_000, last_ms + 200), None);
    }

    #[test]
    fn edge_accepted_across_wrap_when_idle() {
        let capture = EdgeCapture::new();
        capture.on_edge(DataLine::One, u32::MAX - 100, 0);
        capture.reset();
        // Numerically "before" the last edge, but the capture is idle
        capture.on_edge(DataLine::One, 50, 100);
        assert_eq!(capture.bit_count(), 1);
    }

    #[test]
    fn poll_delivers_frame_once() {
        let capture = EdgeCapture::new();
        let mut reader = WiegandReader::new(&capture, ReaderConfig::default());
        let mut t_us = 1_000u32;
        for &b in frame(26, 5, 42).iter() {
            let line = if b == 1 { DataLine::One } else { DataLine::Zero };
            capture.on_edge(line, t_us, u64::from(t_us / 1000));
            t_us += 2_500;
        }
        let last_ms = u64::from(t_us / 1000);
        assert!(reader.poll(t_us, last_ms).is_none());

        let later_us = t_us + 30_000;
        let read = reader.poll(later_us, last_ms + 30).unwrap().unwrap();
        assert_eq!((read.facility_code, read.card_code), (5, 42));
        assert!(capture.is_idle());
        assert_eq!(capture.bit_count(), 0);
        assert!(reader.poll(later_us + 1, last_ms + 31).is_none());
    }

    #[test]
    fn poll_idles_on_millisecond_window() {
        let capture = EdgeCapture::new();
        let mut reader = WiegandReader::new(&capture, ReaderConfig::default());
        capture.on_edge(DataLine::One, 100, 0);
        // Microsecond counter claims no time passed; the ms window still ends the frame
        let result = reader.poll(100, 51).unwrap();
        assert_eq!(result, Err(DecodeError::UnsupportedLength { bits: 1 }));
        assert!(capture.is_idle());
    }
}
