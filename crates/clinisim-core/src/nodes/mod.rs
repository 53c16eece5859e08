//! Graph nodes.
//!
//! Every node is an async function that reads what it needs, makes at most
//! one gateway call, and returns a `StateUpdate`. None of them touch the
//! checkpoint store; the graph merges and persists.

pub mod analysis;
pub mod grading;
pub mod load_profile;
pub mod scoring;
pub mod synthesis;

pub use analysis::analyze;
pub use grading::grade;
pub use load_profile::load_profile;
pub use scoring::score_turn;
pub use synthesis::generate_response;

pub const LOAD_PROFILE: &str = "LoadProfile";
pub const GENERATE_RESPONSE: &str = "GenerateResponse";
pub const SCORE_TURN: &str = "ScoreTurn";
pub const GRADE: &str = "Grade";

/// Sampling temperature per kind of call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperatures {
    pub analysis: f32,
    pub synthesis: f32,
    pub grading: f32,
}

impl Default for Temperatures {
    fn default() -> Self {
        Self {
            analysis: 0.2,
            synthesis: 0.8,
            grading: 0.0,
        }
    }
}
