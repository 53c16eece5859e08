//! Chained transcript entries and exported transcripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use clinisim_contracts::session::{ConversationTurn, SessionId};

/// One stored turn plus its link in the session's hash chain.
///
/// Editing any field of `turn` invalidates `this_hash` and every later
/// `prev_hash`, which `verify_chain` detects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainedTurn {
    /// Position in the session's chain, starting at 0.
    pub sequence: u64,
    pub turn: ConversationTurn,
    pub prev_hash: String,
    pub this_hash: String,
}

impl ChainedTurn {
    /// `prev_hash` of the first turn in every session.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A session transcript sealed for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptExport {
    pub session_id: SessionId,
    pub entries: Vec<ChainedTurn>,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last entry. Empty if the transcript is empty.
    pub terminal_hash: String,
}
