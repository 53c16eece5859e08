//! # clinisim-core
//!
//! The grading-conversation orchestration engine.
//!
//! This crate provides:
//! - the trait seams (`ChatModel`, `ModelGateway`, `Verifier`, stores, `EventSink`)
//! - `StructuredGateway`, which enforces an output contract on every model call
//! - the graph nodes and the `OrchestrationGraph` that runs them
//! - checkpoint stores for per-thread state
//! - the `SessionService` façade and the `ProfileGenerator`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clinisim_core::{OrchestrationGraph, SessionService, StructuredGateway};
//! ```

pub mod checkpoint;
pub mod events;
pub mod gateway;
pub mod generator;
pub mod graph;
pub mod nodes;
pub mod prompt;
pub mod safety;
pub mod schemas;
pub mod session;
pub mod traits;

#[cfg(test)]
mod testing;

pub use gateway::{GatewaySettings, StructuredGateway};
pub use graph::{GraphSettings, OrchestrationGraph};
pub use session::{SessionService, SessionSettings, TurnReply};
