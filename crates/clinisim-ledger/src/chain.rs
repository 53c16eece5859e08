//! Hash-chain primitives for session transcripts.
//!
//! Hash input layout (bytes, in order):
//!   1. session id as 8-byte little-endian
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. turn id, agent flag, content, score, metadata, created_at
//!
//! Variable-length fields are length-prefixed so no two distinct turns can
//! feed the hasher the same byte stream.

use sha2::{Digest, Sha256};

use clinisim_contracts::session::{ConversationTurn, SessionId};

use crate::event::ChainedTurn;

fn update_str(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}

/// SHA-256 over one turn and its position in the session's chain.
///
/// Returns a lowercase 64-character hex string.
pub fn hash_turn(session: SessionId, sequence: u64, turn: &ConversationTurn, prev_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session.0.to_le_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());

    hasher.update(turn.id.0.to_le_bytes());
    hasher.update([turn.agent as u8]);
    update_str(&mut hasher, &turn.content);
    match turn.score {
        Some(score) => {
            hasher.update([1u8]);
            hasher.update(score.to_bits().to_le_bytes());
        }
        None => hasher.update([0u8]),
    }
    let metadata = turn.metadata.as_ref().map(|m| m.to_string()).unwrap_or_default();
    update_str(&mut hasher, &metadata);
    update_str(&mut hasher, &turn.created_at.to_rfc3339());

    hex::encode(hasher.finalize())
}

/// Verify linkage and hash correctness of a session chain.
///
/// An empty chain is valid.
pub fn verify_chain(entries: &[ChainedTurn]) -> bool {
    let mut expected_prev = ChainedTurn::GENESIS_HASH.to_string();

    for entry in entries {
        if entry.prev_hash != expected_prev {
            return false;
        }
        let recomputed = hash_turn(entry.turn.session_id, entry.sequence, &entry.turn, &entry.prev_hash);
        if entry.this_hash != recomputed {
            return false;
        }
        expected_prev = entry.this_hash.clone();
    }

    true
}
