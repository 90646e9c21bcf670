//! # ForkReach Agents
//!
//! Marketing handlers and everything needed to turn one chat message into a
//! streamed reply:
//!
//! - [`scoring`] — keyword-tier intent scorers
//! - [`handler`] — persona + scorer, prompt assembly, streaming generation
//! - [`personas`] — the four built-in handlers
//! - [`registry`] / [`router`] — the ordered handler set and selection
//! - [`frame`] — the UI message-stream frame protocol
//! - [`streamer`] — per-request tasks that emit well-formed frame sequences
//! - [`session`] — context and history for interactive use

pub mod frame;
pub mod handler;
pub mod personas;
pub mod registry;
pub mod router;
pub mod scoring;
pub mod session;
pub mod streamer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use frame::{FinishReason, Frame, FrameIds, STREAM_PROTOCOL_VERSION, validate_sequence};
pub use handler::{GenerationError, GenerationTarget, Handler, HandlerInfo, HandlerStream};
pub use registry::{HandlerRegistry, RegistryError};
pub use router::{HandlerScore, Routed, Router};
pub use scoring::{IntentScorer, KeywordTiers};
pub use session::Session;
pub use streamer::{ResponseStreamer, StreamRequest, StreamerSettings};
