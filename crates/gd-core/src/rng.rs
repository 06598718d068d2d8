//! Random number generation.
//!
//! Wraps a seeded ChaCha RNG for reproducible generation. Two independent
//! streams exist: the long-lived `stable` stream, and a reseedable `quick`
//! stream used for deterministic wilderness corners and persistent-dungeon
//! vault placement. Mode switches nest as a stack of scopes and are always
//! released, even across early returns inside the scope body.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Which stream the next rolls are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RngMode {
    /// The long-lived stream; monsters and objects differ between visits.
    Stable,
    /// The reseedable stream; layouts repeat for a fixed seed.
    Quick,
}

/// Game random number generator.
#[derive(Debug, Clone)]
pub struct GameRng {
    stable: ChaCha8Rng,
    quick: ChaCha8Rng,
    seed: u64,
    mode: RngMode,
    mode_stack: Vec<RngMode>,
}

// Only the seed is persisted; restored games continue from a fresh stream.
impl Serialize for GameRng {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.seed.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GameRng {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let seed = u64::deserialize(deserializer)?;
        Ok(GameRng::new(seed))
    }
}

impl GameRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            stable: ChaCha8Rng::seed_from_u64(seed),
            quick: ChaCha8Rng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15),
            seed,
            mode: RngMode::Stable,
            mode_stack: Vec::new(),
        }
    }

    /// Create a new RNG with a random seed.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Get the seed used to create this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current draw mode.
    pub fn mode(&self) -> RngMode {
        self.mode
    }

    /// Reseed the quick stream without changing the mode.
    pub fn reseed_quick(&mut self, seed: u64) {
        self.quick = ChaCha8Rng::seed_from_u64(seed);
    }

    /// Run `body` with the quick stream reseeded from `seed`. The previous
    /// mode is restored when the scope ends.
    pub fn scoped_quick<T>(&mut self, seed: u64, body: impl FnOnce(&mut Self) -> T) -> T {
        self.reseed_quick(seed);
        self.scoped(RngMode::Quick, body)
    }

    /// Run `body` in the given mode, restoring the previous mode afterward.
    pub fn scoped<T>(&mut self, mode: RngMode, body: impl FnOnce(&mut Self) -> T) -> T {
        self.push_mode(mode);
        let out = body(self);
        self.pop_mode();
        out
    }

    /// Enter a mode; prefer [`GameRng::scoped`] which cannot leak.
    pub fn push_mode(&mut self, mode: RngMode) {
        self.mode_stack.push(self.mode);
        self.mode = mode;
    }

    /// Leave the innermost mode scope.
    pub fn pop_mode(&mut self) {
        if let Some(prev) = self.mode_stack.pop() {
            self.mode = prev;
        }
    }

    fn stream(&mut self) -> &mut ChaCha8Rng {
        match self.mode {
            RngMode::Stable => &mut self.stable,
            RngMode::Quick => &mut self.quick,
        }
    }

    /// Uniform value in `0..n`; returns 0 when `n` is 0.
    pub fn rn2(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.stream().gen_range(0..n)
    }

    /// Uniform value in `1..=n`; returns 0 when `n` is 0.
    pub fn rnd(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        self.stream().gen_range(1..=n)
    }

    /// Uniform value in `lo..=hi`; `lo` when the range is empty.
    pub fn rand_range(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        self.stream().gen_range(lo..=hi)
    }

    /// Uniform value in `center - spread ..= center + spread`.
    pub fn rand_spread(&mut self, center: i32, spread: i32) -> i32 {
        self.rand_range(center - spread, center + spread)
    }

    /// Approximately normal value with the given mean and deviation,
    /// clamped at three deviations.
    pub fn randnor(&mut self, mean: i32, stddev: i32) -> i32 {
        if stddev <= 0 {
            return mean;
        }
        // Irwin-Hall sum of 12 uniforms, recentered to a unit normal.
        let mut acc = 0i64;
        for _ in 0..12 {
            acc += i64::from(self.rn2(1000));
        }
        let z = ((acc as f64 / 999.0) - 6.0).clamp(-3.0, 3.0);
        mean + (z * f64::from(stddev)).round() as i32
    }

    /// Sum of `n` rolls of `1..=m`.
    pub fn dice(&mut self, n: u32, m: u32) -> u32 {
        (0..n).map(|_| self.rnd(m)).sum()
    }

    /// True with probability `1/n`.
    pub fn one_in(&mut self, n: u32) -> bool {
        self.rn2(n) == 0
    }

    /// True with probability `percent/100`.
    pub fn percent(&mut self, percent: u32) -> bool {
        self.rn2(100) < percent
    }

    /// Choose a random element from a slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            let i = self.rn2(items.len() as u32) as usize;
            Some(&items[i])
        }
    }

    /// Shuffle a slice in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.rn2(i as u32 + 1) as usize;
            items.swap(i, j);
        }
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Stable hash for wilderness tile corners. Adjacent tiles share edge
/// values because each corner is derived only from its own coordinate.
pub fn hash_corner(x: i32, y: i32, seed: u32) -> u64 {
    let x = i64::from(x);
    let y = i64::from(y);
    let seed = i64::from(seed);
    ((x - y) ^ ((x + seed) & y)) as u64
}

/// Independent hash for the interior plasma of a wilderness tile.
pub fn hash_level(x: i32, y: i32, seed: u32) -> u64 {
    let x = i64::from(x);
    let y = i64::from(y);
    let seed = i64::from(seed);
    ((y - x) ^ (y & (x + seed))) as u64
}
