//! Human typing cadence.
//!
//! `delay = clamp(chars / U(min_cps, max_cps) + U(min_overhead, max_overhead),
//! min_delay, max_delay)`. With the defaults (15–25 chars/s, 0.2–0.5s
//! overhead, 0.3–3.0s clamp) every delay lies in `[0.3s, 3.0s]` and the
//! expected delay grows with length until the cap.

use std::time::Duration;

use {rand::Rng, ringle_config::PacingConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct PacingModel {
    min_cps: f64,
    max_cps: f64,
    min_overhead: f64,
    max_overhead: f64,
    min_delay: Duration,
    max_delay: Duration,
}

impl Default for PacingModel {
    fn default() -> Self {
        Self::new(&PacingConfig::default())
    }
}

impl PacingModel {
    pub fn new(cfg: &PacingConfig) -> Self {
        let (min_cps, max_cps) = ordered(cfg.min_chars_per_sec, cfg.max_chars_per_sec);
        let (min_overhead, max_overhead) = ordered(
            ms_to_secs(cfg.min_overhead_ms),
            ms_to_secs(cfg.max_overhead_ms),
        );
        let (min_delay, max_delay) = (
            Duration::from_millis(cfg.min_delay_ms.min(cfg.max_delay_ms)),
            Duration::from_millis(cfg.min_delay_ms.max(cfg.max_delay_ms)),
        );
        Self {
            min_cps: min_cps.max(0.1),
            max_cps: max_cps.max(0.1),
            min_overhead,
            max_overhead,
            min_delay,
            max_delay,
        }
    }

    /// Delay before sending `text`, using the thread-local RNG.
    pub fn delay_for(&self, text: &str) -> Duration {
        self.delay_with(text, &mut rand::rng())
    }

    pub fn delay_with<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Duration {
        let len = text.chars().count() as f64;
        let cps = sample(rng, self.min_cps, self.max_cps);
        let overhead = sample(rng, self.min_overhead, self.max_overhead);
        self.clamp(len / cps + overhead)
    }

    /// Smallest and largest delay `delay_for(text)` can return.
    pub fn bounds_for(&self, text: &str) -> (Duration, Duration) {
        let len = text.chars().count() as f64;
        (
            self.clamp(len / self.max_cps + self.min_overhead),
            self.clamp(len / self.min_cps + self.max_overhead),
        )
    }

    /// Upper bound on any single delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    fn clamp(&self, secs: f64) -> Duration {
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .clamp(self.min_delay, self.max_delay)
    }
}

fn sample<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if lo < hi {
        rng.random_range(lo..=hi)
    } else {
        lo
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

fn ms_to_secs(ms: u64) -> f64 {
    Duration::from_millis(ms).as_secs_f64()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        rand::{SeedableRng, rngs::StdRng},
        rstest::rstest,
    };

    const LO: Duration = Duration::from_millis(300);
    const HI: Duration = Duration::from_millis(3000);

    #[rstest]
    #[case("")]
    #[case("k")]
    #[case("Hello!")]
    #[case("By the way, how was your weekend?")]
    #[case("This chunk is long enough that its typing estimate runs into the upper cap.")]
    fn delays_stay_within_clamp(#[case] text: &str) {
        let model = PacingModel::default();
        let mut rng = StdRng::seed_from_u64(7);
        let (lo, hi) = model.bounds_for(text);
        for _ in 0..500 {
            let d = model.delay_with(text, &mut rng);
            assert!(d >= LO && d <= HI, "{d:?}");
            assert!(d >= lo && d <= hi, "{d:?} not in {lo:?}..{hi:?}");
        }
    }

    #[test]
    fn production_rng_also_clamped() {
        let model = PacingModel::default();
        let long = "x".repeat(1000);
        for text in ["", "hi", long.as_str()] {
            let d = model.delay_for(text);
            assert!(d >= LO && d <= HI);
        }
    }

    #[test]
    fn mean_delay_grows_with_length() {
        let model = PacingModel::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mean = |len: usize, rng: &mut StdRng| {
            let text = "a".repeat(len);
            (0..400)
                .map(|_| model.delay_with(&text, rng).as_secs_f64())
                .sum::<f64>()
                / 400.0
        };
        let means: Vec<f64> = [0, 10, 20, 40, 60, 100]
            .into_iter()
            .map(|len| mean(len, &mut rng))
            .collect();
        for pair in means.windows(2) {
            assert!(pair[0] <= pair[1] + 1e-9, "{means:?}");
        }
    }

    #[test]
    fn long_text_hits_cap() {
        let model = PacingModel::default();
        let text = "x".repeat(200);
        assert_eq!(model.bounds_for(&text), (HI, HI));
        assert_eq!(model.delay_for(&text), HI);
    }

    #[test]
    fn documented_bounds() {
        let model = PacingModel::default();
        // 20 chars: 20/25 + 0.2 = 1.0s, 20/15 + 0.5 ~= 1.833s
        let (lo, hi) = model.bounds_for(&"x".repeat(20));
        assert!((lo.as_secs_f64() - 1.0).abs() < 1e-9);
        assert!((hi.as_secs_f64() - (20.0 / 15.0 + 0.5)).abs() < 1e-9);
    }

    #[test]
    fn inverted_config_is_normalized() {
        let cfg = PacingConfig {
            min_chars_per_sec: 25.0,
            max_chars_per_sec: 15.0,
            min_delay_ms: 3000,
            max_delay_ms: 300,
            ..Default::default()
        };
        assert_eq!(PacingModel::new(&cfg), PacingModel::default());
    }
}
