//! Serial reporting: frame layout and the single-slot transmit gate.
//!
//! Layout: Header [1], Checksum [1], Tach [2], Voltage [2], Current [2],
//! multi-byte fields little-endian. The checksum is the 8-bit wrapping sum
//! of the six payload bytes; it covers neither the header nor itself.
//! Receivers resynchronize on the fixed size and header byte alone.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::config::FRAME_HEADER;

/// Wire size of one report.
pub const FRAME_SIZE: usize = 8;

/// One fully encoded report, immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    data: [u8; FRAME_SIZE],
}

impl Frame {
    pub fn new(period_ticks: u16, voltage_raw: u16, current_raw: u16) -> Self {
        let mut data = [0; FRAME_SIZE];
        data[0] = FRAME_HEADER;
        data[2..4].copy_from_slice(&period_ticks.to_le_bytes());
        data[4..6].copy_from_slice(&voltage_raw.to_le_bytes());
        data[6..8].copy_from_slice(&current_raw.to_le_bytes());
        data[1] = checksum(&data[2..]);
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.data
    }
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |sum, b| sum.wrapping_add(*b))
}

/// Hand-off slot between the sampling loop and the UART drain task.
///
/// Capacity 1: the occupied/empty state of the slot is the transmitter's
/// busy/idle flag, so at most one frame is ever in flight.
pub type FrameChannel = Channel<CriticalSectionRawMutex, Frame, 1>;

/// Producer half of the reporting path.
///
/// A frame offered while the previous one is still in flight is dropped and
/// permanently latches the overrun flag; there is no retry, the measurement
/// for that cycle is simply lost. The latch is meant to drive a persistent
/// status indicator, so a lossy link is visible even when most frames get
/// through.
pub struct FrameSender {
    frames: &'static FrameChannel,
    overrun: bool,
}

impl FrameSender {
    pub fn new(frames: &'static FrameChannel) -> Self {
        Self {
            frames,
            overrun: false,
        }
    }

    /// Encodes and queues one report. Returns false (and latches the
    /// overrun flag) if the previous frame has not fully drained yet.
    pub fn try_send(&mut self, period_ticks: u16, voltage_raw: u16, current_raw: u16) -> bool {
        let frame = Frame::new(period_ticks, voltage_raw, current_raw);
        let accepted = self.frames.try_send(frame).is_ok();
        if !accepted {
            self.overrun = true;
        }
        accepted
    }

    /// True once any frame has ever been dropped. Never clears.
    pub fn overrun(&self) -> bool {
        self.overrun
    }
}

#[cfg(feature = "defmt")]
impl Format for Frame {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Frame {{ {=[u8]:02x} }}", self.data)
    }
}
