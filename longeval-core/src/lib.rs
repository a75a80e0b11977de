//! # longeval-core
//!
//! Model-backend boundary for the longeval benchmark harness.
//!
//! The evaluation engine never talks to a provider directly; it depends on
//! the [`ModelBackend`] trait and passes an explicit [`GenerationConfig`]
//! into every call. Concrete clients live behind the trait:
//!
//! - [`ChatCompletionsBackend`]: any OpenAI-compatible HTTP endpoint
//! - [`MockBackend`]: scripted outputs for offline, deterministic tests
//!
//! Backends declare a [`DispatchMode`] at construction. The harness uses it
//! to choose between one bulk `generate_batch` submission and per-item
//! `generate` calls, without inspecting concrete types.

pub mod backend;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use backend::{DispatchMode, GenerationOutput, ModelBackend, StagedInput};
pub use config::{GenerationConfig, THINKING_RESERVE_TOKENS};
pub use error::BackendError;
pub use mock::MockBackend;
pub use openai::ChatCompletionsBackend;
