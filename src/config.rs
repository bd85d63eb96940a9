//! Tuning constants.
//!
//! These values are empirical: they were chosen for a 100 kHz tick clock, a
//! 12-bit ADC and one particular photodiode/light geometry. Retargeting to a
//! different tick rate or optical setup means revisiting them, not the code
//! that consumes them.

/// Depth of the ambient-light tracking window, in samples.
///
/// Large relative to a blade-passage pulse, so the tracked mean follows slow
/// ambient drift while staying flat across the fast transient the edge
/// detector isolates.
pub const DC_WINDOW: usize = 1024;

/// AC swing, in raw ADC counts, that counts as a blade entering the beam.
/// The detector re-arms once the swing falls below a quarter of this.
pub const PEAK_THRESHOLD: i32 = 30;

/// Ticks of silence after which the rotor is reported as stopped.
///
/// At the 100 kHz tick rate this is 0.5 s, which bounds the reporting
/// latency for a stalled rotor. Must stay below the 16-bit timestamp wrap
/// (65 536 ticks) or a stopped rotor would alias into a short period.
pub const STALL_TIMEOUT_TICKS: u16 = 50_000;

/// Marker byte opening every serial frame.
pub const FRAME_HEADER: u8 = 0xFA;

/// Telemetry link baud rate, 8N1.
pub const SERIAL_BAUD: u32 = 115_200;
