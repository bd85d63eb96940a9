//! Photodiode signal front-end.
//!
//! Two pieces turn the raw ADC waveform into discrete blade-passage events:
//! [`DcTracker`] follows the slow ambient-light level, and [`EdgeDetector`]
//! watches the fast AC residue for the transient of a blade crossing the
//! beam.

use heapless::HistoryBuffer;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::config::DC_WINDOW;

/// Sliding-window mean of the ambient (DC) light level.
///
/// Keeps the last [`DC_WINDOW`] samples and their running sum; the estimate
/// is the integer-floor mean over however many samples have been seen, or
/// over exactly the window once it has filled.
pub struct DcTracker {
    hist: HistoryBuffer<u16, DC_WINDOW>,
    sum: u32,
}

impl DcTracker {
    pub fn new() -> Self {
        Self {
            hist: HistoryBuffer::new(),
            sum: 0,
        }
    }

    /// Absorbs one sample and returns the updated DC estimate.
    pub fn update(&mut self, sample: u16) -> u16 {
        if self.hist.len() == DC_WINDOW {
            if let Some(&oldest) = self.hist.oldest_ordered().next() {
                self.sum -= u32::from(oldest);
            }
        }
        self.hist.write(sample);
        self.sum += u32::from(sample);
        (self.sum / self.hist.len() as u32) as u16
    }
}

impl Default for DcTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// What one sample means for the pulse output and the period monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum Detection {
    /// The AC signal crossed the entry threshold: one blade passage.
    /// Drive the pulse output high.
    Edge,
    /// Below the entry threshold and out of peak. Drive the pulse output
    /// low.
    Idle,
    /// Inside a peak, or just left one. Leave the pulse output as is.
    Hold,
}

/// Hysteresis detector for blade-passage transients.
///
/// Fires exactly once per excursion: an [`Detection::Edge`] is reported when
/// the AC signal rises above the entry threshold, and no further edge can
/// fire until it has dropped below the (four times smaller) exit threshold.
/// The gap between the two thresholds is what keeps noise riding on the
/// waveform from double-counting a single blade.
pub struct EdgeDetector {
    in_peak: bool,
    entry_threshold: i32,
    exit_threshold: i32,
}

impl EdgeDetector {
    pub fn new(entry_threshold: i32) -> Self {
        Self {
            in_peak: false,
            entry_threshold,
            exit_threshold: entry_threshold / 4,
        }
    }

    /// Classifies one sample against the current DC estimate.
    pub fn detect(&mut self, sample: u16, dc: u16) -> Detection {
        let ac = i32::from(sample) - i32::from(dc);
        if self.in_peak {
            if ac < self.exit_threshold {
                self.in_peak = false;
            }
            Detection::Hold
        } else if ac > self.entry_threshold {
            self.in_peak = true;
            Detection::Edge
        } else {
            Detection::Idle
        }
    }
}

#[cfg(feature = "defmt")]
impl Format for DcTracker {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DcTracker {{ seen: {} }}", self.hist.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PEAK_THRESHOLD;

    #[test]
    fn dc_estimate_is_floor_mean_while_filling() {
        let mut dc = DcTracker::new();
        assert_eq!(dc.update(10), 10);
        assert_eq!(dc.update(21), 15); // floor(31 / 2)
        assert_eq!(dc.update(32), 21); // floor(63 / 3)
    }

    #[test]
    fn dc_window_slides_once_full() {
        let mut dc = DcTracker::new();
        for _ in 0..DC_WINDOW {
            dc.update(10);
        }
        // Half the window replaced by a brighter level: mean over exactly
        // the last DC_WINDOW samples, evicting the oldest.
        let mut last = 0;
        for _ in 0..DC_WINDOW / 2 {
            last = dc.update(110);
        }
        assert_eq!(last, 60); // (512 * 10 + 512 * 110) / 1024

        // Fully replaced: the old level no longer contributes.
        for _ in 0..DC_WINDOW / 2 {
            last = dc.update(110);
        }
        assert_eq!(last, 110);
    }

    #[test]
    fn edge_fires_once_on_entry() {
        let mut det = EdgeDetector::new(PEAK_THRESHOLD);
        let dc = 100;
        assert_eq!(det.detect(131, dc), Detection::Edge); // ac = 31
        assert_eq!(det.detect(140, dc), Detection::Hold); // still in peak
        assert_eq!(det.detect(131, dc), Detection::Hold); // no re-fire
    }

    #[test]
    fn detector_rearms_only_below_exit_threshold() {
        let mut det = EdgeDetector::new(PEAK_THRESHOLD);
        let dc = 100;
        assert_eq!(det.detect(131, dc), Detection::Edge);
        // ac = 8: above the exit threshold, the peak is still latched even
        // though the entry threshold has been left far behind.
        assert_eq!(det.detect(108, dc), Detection::Hold);
        assert_eq!(det.detect(131, dc), Detection::Hold);
        // ac = 6 < 7 re-arms; the pin is left as is for this one sample.
        assert_eq!(det.detect(106, dc), Detection::Hold);
        assert_eq!(det.detect(108, dc), Detection::Idle);
        assert_eq!(det.detect(131, dc), Detection::Edge);
    }

    #[test]
    fn quiet_signal_stays_idle() {
        let mut det = EdgeDetector::new(PEAK_THRESHOLD);
        for sample in [100, 115, 130, 70] {
            // ac never exceeds +30
            assert_eq!(det.detect(sample, 100), Detection::Idle);
        }
    }
}
