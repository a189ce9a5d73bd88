use tracing::debug;

use crate::block::Block;
use crate::hash;
use crate::pow;

/// Check that every block links to its predecessor by digest, carries a valid
/// proof relative to the predecessor's proof, and has the next index.
///
/// Empty and single-block chains are valid. Stops at the first violation.
pub fn is_valid_chain(chain: &[Block]) -> bool {
    for pair in chain.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);

        if cur.index != prev.index.wrapping_add(1) {
            debug!(index = cur.index, prev = prev.index, "index out of sequence");
            return false;
        }
        if cur.previous_hash != hash::digest(prev) {
            debug!(index = cur.index, "previous_hash does not match predecessor");
            return false;
        }
        if !pow::is_valid_proof(prev.proof, cur.proof) {
            debug!(index = cur.index, proof = cur.proof, "invalid proof of work");
            return false;
        }
    }
    true
}
