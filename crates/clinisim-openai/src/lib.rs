//! # clinisim-openai
//!
//! The production `ChatModel`: an HTTP client for the OpenAI Chat Completions
//! API and compatible servers.
//!
//! ```rust,ignore
//! use clinisim_openai::OpenAiChatModel;
//!
//! let model = OpenAiChatModel::from_env("https://api.openai.com/v1", "gpt-4o", "OPENAI_API_KEY")?;
//! let gateway = StructuredGateway::new(Arc::new(model), verifier, settings);
//! ```

pub mod chat;

pub use chat::{is_retryable_status, OpenAiChatModel};
