//! # clinisim-contracts
//!
//! Shared types and output contracts for the clinisim grading engine.
//!
//! Every crate in the workspace imports from here. Nothing in this crate
//! calls a model or touches storage; it holds data definitions, validation
//! helpers, and the error type.

pub mod analysis;
pub mod error;
pub mod profile;
pub mod session;
pub mod thread;
pub mod verify;
