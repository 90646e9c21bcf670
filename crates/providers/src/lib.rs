//! Text generation backends for ForkReach.
//!
//! All providers implement the `forkreach_core::Provider` trait. The
//! [`BackendRegistry`] maps requested model ids onto the wired providers.

pub mod backend;
pub mod gemini;
pub mod openai_compat;
mod transport;

pub use backend::{BackendRegistry, ModelInfo, Resolution, build_from_config};
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
