//! Proof-of-work over a pair of consecutive proofs.
//!
//! A proof `q` is valid after `p` when `sha256("(p, q)")` in hex starts with
//! [`POW_TARGET_PREFIX`]. The search scans candidates upward from zero and
//! always yields the smallest valid one, so every node agrees on it.

use rayon::prelude::*;

use crate::constants::POW_TARGET_PREFIX;
use crate::hash::sha256_hex;

/// Hex digest of the ordered proof pair.
pub fn proof_hash(last_proof: u64, proof: u64) -> String {
    sha256_hex(format!("({last_proof}, {proof})").as_bytes())
}

pub fn is_valid_proof(last_proof: u64, proof: u64) -> bool {
    proof_hash(last_proof, proof).starts_with(POW_TARGET_PREFIX)
}

/// Sequential search from 0. Runs until a proof is found.
pub fn mine(last_proof: u64) -> u64 {
    let mut proof = 0u64;
    while !is_valid_proof(last_proof, proof) {
        proof = proof.wrapping_add(1);
    }
    proof
}

/// Candidates checked in parallel per window. The stop predicate is polled
/// between windows.
pub const SEARCH_WINDOW: u64 = 16_384;

/// Parallel search across the rayon pool, one window of candidates at a
/// time. Windows are visited in order and each yields its first match, so
/// the result equals [`mine`]. Returns `None` once `stop` fires.
pub fn mine_parallel_until<F>(last_proof: u64, stop: F) -> Option<u64>
where
    F: Fn() -> bool,
{
    let mut base = 0u64;
    loop {
        if stop() {
            return None;
        }
        let found = (0..SEARCH_WINDOW as usize)
            .into_par_iter()
            .map(|offset| base.saturating_add(offset as u64))
            .find_first(|&candidate| is_valid_proof(last_proof, candidate));
        if let Some(proof) = found {
            return Some(proof);
        }
        base = base.checked_add(SEARCH_WINDOW)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[test]
    fn proof_hash_encodes_pair_in_order() {
        assert_eq!(proof_hash(1, 2), sha256_hex(b"(1, 2)"));
        assert_ne!(proof_hash(1, 2), proof_hash(2, 1));
    }

    #[test]
    fn validity_is_deterministic() {
        for q in 0..200 {
            assert_eq!(is_valid_proof(100, q), is_valid_proof(100, q));
        }
    }

    #[test]
    fn mine_finds_smallest_valid_proof() {
        let proof = mine(100);
        assert!(is_valid_proof(100, proof));
        assert!((0..proof).all(|q| !is_valid_proof(100, q)));
    }

    #[test]
    fn mine_result_chains_forward() {
        let first = mine(100);
        let second = mine(first);
        assert!(is_valid_proof(first, second));
    }

    #[test]
    fn parallel_search_stops_between_windows() {
        let polls = AtomicU64::new(0);
        let out = mine_parallel_until(100, || polls.fetch_add(1, Ordering::Relaxed) >= 1);
        let expected = mine(100);
        if expected < SEARCH_WINDOW {
            assert_eq!(out, Some(expected));
        } else {
            assert_eq!(out, None);
        }
    }

    #[test]
    fn parallel_search_agrees_with_sequential() {
        assert_eq!(mine_parallel_until(100, || false), Some(mine(100)));
        assert_eq!(mine_parallel_until(12_345, || false), Some(mine(12_345)));
    }

    #[test]
    fn parallel_search_honours_stop_flag() {
        let stop = AtomicBool::new(true);
        assert_eq!(
            mine_parallel_until(100, || stop.load(Ordering::Relaxed)),
            None
        );
    }
}
