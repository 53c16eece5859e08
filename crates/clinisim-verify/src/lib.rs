//! # clinisim-verify
//!
//! Output contract verification for the clinisim engine.
//!
//! This crate provides [`engine::SchemaVerifier`], which implements the
//! [`clinisim_core::traits::Verifier`] trait. It validates raw model output
//! in two phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate.
//! 2. **Semantic**: rules (`RequiredField`, `AllowedValues`, `NumericRange`,
//!    `NonEmptyString`, `ForbiddenPattern`, `Custom`) evaluated against the
//!    output.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use clinisim_verify::engine::SchemaVerifier;
//!
//! let mut verifier = SchemaVerifier::clinical();
//! verifier.register_rule("no-diagnosis-leak", Box::new(|payload| {
//!     let reply = payload.get("patient_response")?.as_str()?;
//!     reply.contains("F32").then(|| "reply names an ICD code".to_string())
//! }));
//! ```

pub mod engine;

pub use engine::{SchemaVerifier, NO_SELF_HARM_INSTRUCTIONS};
