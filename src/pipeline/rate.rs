//! Moving-average frame rate over a fixed ring of samples

use std::sync::atomic::{AtomicU64, Ordering};

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

/// Number of instantaneous samples averaged once warmed up
pub const RATE_WINDOW: usize = 10;

/// Smooths per-frame timestamps into a stable FPS value.
///
/// Reports nothing until [`RATE_WINDOW`] samples were collected, so the first
/// `RATE_WINDOW` calls return `None` (the first call only records a start time).
pub struct RateEstimator {
    last_ms: Option<f64>,
    samples: HeapRb<f64>,
}

impl RateEstimator {
    pub fn new() -> Self {
        Self {
            last_ms: None,
            samples: HeapRb::new(RATE_WINDOW),
        }
    }

    /// Feed the current timestamp in milliseconds and get the smoothed rate.
    ///
    /// A timestamp that does not move forward yields no sample but still
    /// becomes the new reference point.
    pub fn update(&mut self, now_ms: f64) -> Option<f64> {
        let last_ms = self.last_ms.replace(now_ms)?;

        let elapsed = now_ms - last_ms;
        if elapsed > 0.0 {
            // ring is full after RATE_WINDOW pushes; the oldest sample falls out
            self.samples.push_overwrite(1000.0 / elapsed);
        }

        self.value()
    }

    /// Current smoothed rate, `None` while warming up.
    pub fn value(&self) -> Option<f64> {
        if !self.is_warmed_up() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / RATE_WINDOW as f64)
    }

    pub fn is_warmed_up(&self) -> bool {
        self.samples.occupied_len() == RATE_WINDOW
    }

    /// Samples collected so far, capped at [`RATE_WINDOW`].
    pub fn sample_count(&self) -> usize {
        self.samples.occupied_len()
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Bit pattern meaning "no rate yet"; a NaN the estimator never produces
const UNSET: u64 = u64::MAX;

/// Last published rate, readable from any thread without locking.
///
/// The worker stores the estimator output after every frame; readers get
/// either the previous or the new value, never a torn one.
#[derive(Debug)]
pub struct FpsGauge {
    bits: AtomicU64,
}

impl FpsGauge {
    pub fn new() -> Self {
        Self {
            bits: AtomicU64::new(UNSET),
        }
    }

    pub fn publish(&self, fps: Option<f64>) {
        let bits = fps.map_or(UNSET, f64::to_bits);
        self.bits.store(bits, Ordering::Release);
    }

    pub fn read(&self) -> Option<f64> {
        match self.bits.load(Ordering::Acquire) {
            UNSET => None,
            bits => Some(f64::from_bits(bits)),
        }
    }
}

impl Default for FpsGauge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_ten_calls_report_nothing() {
        let mut rate = RateEstimator::new();
        for i in 0..10 {
            assert_eq!(rate.update(1000.0 + 10.0 * i as f64), None, "call {}", i + 1);
        }
        assert_eq!(rate.sample_count(), 9);
        assert!(rate.update(1100.0).is_some());
    }

    #[test]
    fn test_constant_cadence_converges() {
        let mut rate = RateEstimator::new();
        let mut last = None;
        for i in 0..50 {
            last = rate.update(1000.0 + 10.0 * i as f64);
        }
        let fps = last.unwrap();
        assert!((fps - 100.0).abs() < 1e-9, "fps = {fps}");
    }

    #[test]
    fn test_oldest_sample_is_evicted() {
        let mut rate = RateEstimator::new();
        let mut t = 0.0;
        rate.update(t);
        for _ in 0..10 {
            t += 10.0; // 100 fps
            rate.update(t);
        }
        assert!((rate.value().unwrap() - 100.0).abs() < 1e-9);

        for _ in 0..10 {
            t += 20.0; // 50 fps
            rate.update(t);
        }
        assert!((rate.value().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_mixed_window_average() {
        let mut rate = RateEstimator::new();
        let mut t = 0.0;
        rate.update(t);
        for i in 0..10 {
            t += if i < 5 { 10.0 } else { 20.0 };
            rate.update(t);
        }
        assert!((rate.value().unwrap() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_increasing_timestamp_adds_no_sample() {
        let mut rate = RateEstimator::new();
        rate.update(100.0);
        rate.update(100.0);
        rate.update(90.0);
        assert_eq!(rate.sample_count(), 0);
        rate.update(100.0);
        assert_eq!(rate.sample_count(), 1);
    }

    #[test]
    fn test_zero_rate_samples_count_toward_warm_up() {
        // warm-up is tracked by count, so tiny rates still count
        let mut rate = RateEstimator::new();
        let mut t = 0.0;
        rate.update(t);
        for _ in 0..10 {
            t += 1e300;
            rate.update(t);
        }
        assert!(rate.is_warmed_up());
        assert!(rate.value().unwrap() < 1e-290);
    }

    #[test]
    fn test_gauge_publishes_latest_rate() {
        let gauge = FpsGauge::new();
        assert_eq!(gauge.read(), None);

        gauge.publish(Some(29.97));
        assert_eq!(gauge.read(), Some(29.97));

        gauge.publish(None);
        assert_eq!(gauge.read(), None);
    }

    #[test]
    fn test_gauge_read_from_another_thread() {
        let gauge = std::sync::Arc::new(FpsGauge::new());
        let mut rate = RateEstimator::new();
        for i in 0..11 {
            gauge.publish(rate.update(10.0 * i as f64));
        }

        let reader = gauge.clone();
        let seen = std::thread::spawn(move || reader.read()).join().unwrap();
        assert_eq!(seen, Some(100.0));
    }
}
