//! Injectable randomness. Every random decision in the engine and the crate
//! economy goes through a [`UnitSource`], so a scripted source makes a whole
//! run reproducible.

use rand::Rng;

/// A uniform generator over `[0, 1)`.
pub trait UnitSource {
    fn next_unit(&mut self) -> f64;
}

impl<S: UnitSource + ?Sized> UnitSource for &mut S {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// Picks an index in `0..len` as `floor(u * len) % len`. `len` must be non-zero.
pub fn pick_index(source: &mut impl UnitSource, len: usize) -> usize {
    debug_assert!(len > 0, "pick_index on an empty range");
    let unit = source.next_unit();
    ((unit * len as f64).floor() as usize) % len
}

/// Adapter over any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandSource<R>(pub R);

impl RandSource<rand::rngs::StdRng> {
    pub fn seeded(seed: u64) -> Self {
        use rand::SeedableRng;
        RandSource(rand::rngs::StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        use rand::SeedableRng;
        RandSource(rand::rngs::StdRng::from_entropy())
    }
}

impl<R: Rng> UnitSource for RandSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Replays a fixed list of samples, cycling once exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSource {
    values: Vec<f64>,
    next: usize,
}

impl SequenceSource {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let mut values: Vec<f64> = values.into();
        if values.is_empty() {
            values.push(0.0);
        }
        // Keep samples inside [0, 1) so picked indices stay in range.
        for v in values.iter_mut() {
            *v = v.clamp(0.0, 1.0 - f64::EPSILON);
        }
        SequenceSource { values, next: 0 }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl UnitSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        let value = self.values[self.next];
        self.next = (self.next + 1) % self.values.len();
        value
    }
}
