//! Randomness seam for shuffles and prompt placement.
//!
//! Lobbies own a boxed RNG so tests can inject a seeded source and replay
//! deals deterministically. Production uses an entropy-seeded `StdRng`.

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// RNG handle owned by a lobby.
pub type LobbyRng = Box<dyn RngCore + Send>;

/// Entropy-seeded RNG for production lobbies.
#[must_use]
pub fn entropy_rng() -> LobbyRng {
    Box::new(StdRng::from_entropy())
}

/// Seeded RNG for deterministic tests.
#[must_use]
pub fn seeded_rng(seed: u64) -> LobbyRng {
    Box::new(StdRng::seed_from_u64(seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let mut a = seeded_rng(7);
        let mut b = seeded_rng(7);
        let xs: Vec<u32> = (0..8).map(|_| a.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen()).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = seeded_rng(1);
        let mut b = seeded_rng(2);
        let xs: Vec<u32> = (0..8).map(|_| a.gen()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen()).collect();
        assert_ne!(xs, ys);
    }
}
