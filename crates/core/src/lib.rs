//! # ForkReach Core
//!
//! Domain types, traits, and error definitions for the ForkReach marketing
//! agent service. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here. Implementations
//! live in their respective crates:
//! - [`Provider`] — text generation backends (`forkreach-providers`)
//! - [`RecordStore`] — device-scoped conversation/product records (`forkreach-store`)

pub mod context;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use context::{BrandVoice, SessionContext};
pub use error::{ProviderError, StoreError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role, Turn, TurnRole};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use store::{
    ConversationRecord, ConversationWithMessages, DeviceId, MessageRecord, NewMessage, ProductInput,
    ProductRecord, RecordStore,
};
