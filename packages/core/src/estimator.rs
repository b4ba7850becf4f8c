//! Buffon's needle estimate of π.
//!
//! Needles of length 1 are dropped on a floor ruled with lines 2 apart. The
//! needle's angle is drawn by rejection sampling a point in the unit quarter
//! disc, so the sampler never needs π itself. The crossing probability is
//! `1/π`, giving `π ≈ drops / crossings`.

use rand::Rng;
use rand::distributions::{Distribution, Standard};

/// Default number of drops per job.
pub const DEFAULT_ITERATIONS: u64 = 10_000_000;

/// Height of the reference line a needle tip has to exceed.
const LINE_HEIGHT: f64 = 2.0;

/// Outcome of an estimation run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    /// `drops / crossings`.
    Value(f64),
    /// No needle crossed a line, so the ratio does not exist.
    Undefined,
}

impl Estimate {
    /// Compute the estimate from a finished tally.
    pub fn from_tally(drops: u64, crossings: u64) -> Self {
        if crossings == 0 {
            Estimate::Undefined
        } else {
            Estimate::Value(drops as f64 / crossings as f64)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Estimate::Value(v) => Some(*v),
            Estimate::Undefined => None,
        }
    }
}

impl From<Option<f64>> for Estimate {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Estimate::Undefined, Estimate::Value)
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    Standard.sample(rng)
}

/// Drop one needle. Returns `true` if it crosses a line.
pub fn drop_needle<R: Rng + ?Sized>(rng: &mut R) -> bool {
    // Redraw until the point lies inside the quarter disc (and off the origin,
    // where the angle is meaningless).
    let (dy, r) = loop {
        let dx = uniform(rng);
        let dy = uniform(rng);
        let r = (dx * dx + dy * dy).sqrt();
        if r > 0.0 && r <= 1.0 {
            break (dy, r);
        }
    };

    let tip = 2.0 * uniform(rng) + dy / r;
    tip > LINE_HEIGHT
}

/// Run `iterations` drops, calling `on_progress(i + 1)` after each one.
pub fn estimate_pi<R, F>(rng: &mut R, iterations: u64, mut on_progress: F) -> Estimate
where
    R: Rng + ?Sized,
    F: FnMut(u64),
{
    let mut crossings = 0u64;
    for i in 0..iterations {
        if drop_needle(rng) {
            crossings += 1;
        }
        on_progress(i + 1);
    }
    Estimate::from_tally(iterations, crossings)
}
