//! Injectable randomness
//!
//! Every probabilistic decision and jittered delay goes through
//! [`RandomSource`] so tests can pin them.

use std::collections::VecDeque;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource: Send {
    /// Uniform sample in `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool {
        self.next_unit() < p
    }

    /// Uniform duration in `[min, max]`
    fn between(&mut self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        min + (max - min).mul_f64(self.next_unit())
    }

    /// Uniform index into a collection of `len` items
    fn pick(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = (self.next_unit() * len as f64) as usize;
        Some(index.min(len - 1))
    }
}

/// Entropy-seeded source used in production
pub struct SystemRandom {
    rng: StdRng,
}

impl SystemRandom {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic source for reproducible dry runs
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for SystemRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    fn between(&mut self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let millis = self
            .rng
            .gen_range(min.as_millis() as u64..=max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

/// Always returns the same unit sample
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

/// Replays a list of unit samples, repeating the last one when exhausted
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
    last: f64,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            last: 0.0,
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        if let Some(value) = self.values.pop_front() {
            self.last = value;
        }
        self.last
    }
}
