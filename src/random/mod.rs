//! The single source of randomness for a realization.
//!
//! `RngService` owns a main stream, used for population-wide choices that happen in a fixed
//! order (seeding, vaccination, the flu pool, hospital assignment), and derives independent
//! sub-streams keyed by `(kind, day, agent)` for per-agent daily decisions. A sub-stream's
//! seed depends only on the base seed and its key, so per-agent decisions do not depend on the
//! order in which agents are evaluated.
//!
//! Every draw is counted. The driver collects the count once a day.

mod distributions;
pub mod sampling_algorithms;

use std::ops::{Deref, DerefMut};

use log::trace;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use strum::IntoStaticStr;

pub use distributions::{DistributionSpec, Sampler};
use sampling_algorithms::{sample_multiple_from_known_length, sample_single_from_known_length};

use crate::hashing::{hash_key, hash_str};
use crate::population::AgentId;

/// The purpose of a per-agent sub-stream. Each purpose gets its own independent sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum StreamKind {
    Transition,
    Testing,
}

/// A seeded generator that counts the draws taken from it.
pub struct Stream {
    rng: SmallRng,
    draws: u64,
}

impl Stream {
    fn from_seed(seed: u64) -> Stream {
        Stream {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }

    /// Number of draws taken from this stream so far.
    #[must_use]
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// A uniform draw from `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.draws += 1;
        self.rng.random::<f64>()
    }

    /// Returns true with probability `p`. Always consumes exactly one draw, whatever `p` is,
    /// so that the draw sequence does not depend on parameter values.
    pub fn bernoulli(&mut self, p: f64) -> bool {
        self.uniform() < p
    }

    /// Draws a value from a validated distribution. Fixed values consume no draw.
    pub fn sample(&mut self, sampler: &Sampler) -> f64 {
        if sampler.is_fixed() {
            return sampler.sample(&mut self.rng);
        }
        self.draws += 1;
        sampler.sample(&mut self.rng)
    }

    /// Draws a duration and rounds it to a whole, non-negative number of days.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_days(&mut self, sampler: &Sampler) -> u32 {
        let value = self.sample(sampler);
        if value.is_finite() {
            value.max(0.0).round().min(f64::from(u32::MAX)) as u32
        } else {
            0
        }
    }

    /// Picks an index uniformly from `0..len`, or `None` if `len` is zero.
    pub fn sample_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        self.draws += 1;
        sample_single_from_known_length(&mut self.rng, 0..len)
    }

    /// Picks `requested` distinct indexes uniformly from `0..len`, in increasing order.
    /// Returns fewer than `requested` only if `len < requested`.
    pub fn choose_multiple(&mut self, len: usize, requested: usize) -> Vec<usize> {
        let requested = requested.min(len);
        if requested == 0 {
            return Vec::new();
        }
        self.draws += requested as u64;
        sample_multiple_from_known_length(&mut self.rng, 0..len, requested)
    }
}

/// Owner of the base seed and the main stream of a realization.
pub struct RngService {
    base_seed: u64,
    main: Stream,
    substream_draws: u64,
    reported_draws: u64,
}

impl RngService {
    #[must_use]
    pub fn new(seed: u64) -> RngService {
        RngService {
            base_seed: seed,
            main: Stream::from_seed(seed.wrapping_add(hash_str("main"))),
            substream_draws: 0,
            reported_draws: 0,
        }
    }

    /// Re-seeds the service. All streams derived afterwards use the new seed.
    pub fn seed(&mut self, value: u64) {
        trace!("seeding random service with {value}");
        *self = RngService::new(value);
    }

    #[must_use]
    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    /// Derives the sub-stream for one agent's decision of the given kind on the given day.
    #[must_use]
    pub fn substream(&self, kind: StreamKind, day: u32, agent: AgentId) -> Stream {
        let label: &'static str = kind.into();
        let offset = hash_key(label, &[u64::from(day), agent.index() as u64]);
        Stream::from_seed(self.base_seed.wrapping_add(offset))
    }

    /// Adds the draws taken from a finished sub-stream to the service's tally.
    pub fn absorb(&mut self, stream: &Stream) {
        self.substream_draws += stream.draws();
    }

    /// Total draws taken from the main stream and all absorbed sub-streams.
    #[must_use]
    pub fn total_draws(&self) -> u64 {
        self.main.draws() + self.substream_draws
    }

    /// Draws taken since the previous call.
    pub fn take_draws(&mut self) -> u64 {
        let total = self.total_draws();
        let taken = total - self.reported_draws;
        self.reported_draws = total;
        taken
    }
}

impl Deref for RngService {
    type Target = Stream;

    fn deref(&self) -> &Stream {
        &self.main
    }
}

impl DerefMut for RngService {
    fn deref_mut(&mut self) -> &mut Stream {
        &mut self.main
    }
}
