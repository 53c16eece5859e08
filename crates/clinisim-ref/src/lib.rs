//! # clinisim-ref
//!
//! Reference runtime for the clinisim grading-conversation engine.
//!
//! Wires every engine crate into a `Runtime` and demonstrates four
//! scenarios against a deterministic `ScriptedModel`:
//!
//! 1. **Incremental Interview**: six scored turns against a depression case,
//!    then a transcript integrity check.
//! 2. **Risk Disclosure**: escalation is forced into the risk critique, and
//!    an instructional patient reply is rejected.
//! 3. **Holistic Completion**: the whole transcript is graded once, and a
//!    second completion is refused.
//! 4. **Profile Generation**: a new case is generated and stored, and
//!    out-of-range severities are rejected.
//!
//! All case data is hardcoded and fictional. No external API calls are made.

pub mod runtime;
pub mod sample_data;
pub mod scenarios;
pub mod scripted;

pub use runtime::Runtime;
pub use scripted::ScriptedModel;
