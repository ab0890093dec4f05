use crate::card::{full_deck, Card};
use rand::{RngCore, SeedableRng};

const MULTIPLIER: u64 = 0x2545_F491_4F6C_DD1D;
// xorshift is absorbed by an all-zero state.
const ZERO_SEED_REPLACEMENT: u64 = 0x9E37_79B9_7F4A_7C15;

/// Seeded xorshift* generator. Every shuffle builds its own instance so deals
/// only ever depend on the seed they were given.
#[derive(Clone, Debug)]
pub struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { ZERO_SEED_REPLACEMENT } else { seed },
        }
    }

    /// Index in `0..bound`, by modulo over the raw value with its sign bit
    /// cleared. The small modulo bias is accepted. A zero bound yields 0
    /// without advancing the generator.
    pub fn next_int(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        ((self.next_u64() & i64::MAX as u64) % bound as u64) as usize
    }
}

impl RngCore for XorShift64Star {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(MULTIPLIER)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for XorShift64Star {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Self::new(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

/// Fisher–Yates, last index down to 1.
pub fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut rng = XorShift64Star::new(seed);
    for i in (1..items.len()).rev() {
        let j = rng.next_int(i + 1);
        items.swap(i, j);
    }
}

pub fn shuffled_deck(seed: u64) -> Vec<Card> {
    let mut deck = full_deck();
    shuffle(&mut deck, seed);
    deck
}

/// Fresh seed for callers that want a new random deal.
pub fn random_seed() -> u64 {
    rand::random()
}
