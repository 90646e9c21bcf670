//! Record store trait — device-scoped persistence for conversations and products.
//!
//! Every operation is keyed by an opaque [`DeviceId`] supplied by the caller.
//! The identifier is never verified; it only partitions rows. Rows owned by a
//! different device behave exactly like missing rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{BrandVoice, SessionContext};
use crate::error::StoreError;

/// Default title for conversations created without one.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Chat";

/// Opaque caller-supplied device identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a raw identifier. Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored conversation header.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub id: String,
    pub title: String,
    pub device_id: DeviceId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A conversation with its messages in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: ConversationRecord,
    pub messages: Vec<MessageRecord>,
}

/// Input for appending a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A stored product profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub device_id: DeviceId,
    pub name: String,
    pub tagline: Option<String>,
    pub target_audience: Option<String>,
    pub key_features: Vec<String>,
    pub brand_voice: BrandVoice,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// The personalization payload this product contributes to generation.
    pub fn to_session_context(&self) -> SessionContext {
        SessionContext {
            name: self.name.clone(),
            tagline: self.tagline.clone(),
            target_audience: self.target_audience.clone(),
            key_features: self.key_features.clone(),
            brand_voice: Some(self.brand_voice),
        }
    }
}

/// Input for creating or updating a product (upsert by name per device).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub key_features: Option<Vec<String>>,
    #[serde(default)]
    pub brand_voice: BrandVoice,
}

/// Device-scoped record persistence.
///
/// Implementations: in-memory (tests, ephemeral runs) and SQLite.
/// Lookups that miss — including rows owned by another device — return
/// `Ok(None)` / `Ok(false)` rather than an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Backend name (e.g., "memory", "sqlite").
    fn name(&self) -> &str;

    /// Conversations for a device, most recently updated first.
    async fn list_conversations(&self, device: &DeviceId) -> Result<Vec<ConversationRecord>, StoreError>;

    async fn create_conversation(
        &self,
        device: &DeviceId,
        title: Option<String>,
    ) -> Result<ConversationRecord, StoreError>;

    async fn get_conversation(
        &self,
        device: &DeviceId,
        id: &str,
    ) -> Result<Option<ConversationWithMessages>, StoreError>;

    /// Rename a conversation and bump its `updated_at`.
    async fn rename_conversation(
        &self,
        device: &DeviceId,
        id: &str,
        title: &str,
    ) -> Result<Option<ConversationRecord>, StoreError>;

    /// Delete a conversation and all its messages.
    async fn delete_conversation(&self, device: &DeviceId, id: &str) -> Result<bool, StoreError>;

    /// Append a message and bump the conversation's `updated_at`.
    async fn add_message(
        &self,
        device: &DeviceId,
        conversation_id: &str,
        message: NewMessage,
    ) -> Result<Option<MessageRecord>, StoreError>;

    /// Products for a device, most recently updated first.
    async fn list_products(&self, device: &DeviceId) -> Result<Vec<ProductRecord>, StoreError>;

    async fn get_product(&self, device: &DeviceId, id: &str) -> Result<Option<ProductRecord>, StoreError>;

    /// Create a product, or update the device's existing product with the same name.
    async fn upsert_product(&self, device: &DeviceId, input: ProductInput) -> Result<ProductRecord, StoreError>;

    async fn delete_product(&self, device: &DeviceId, id: &str) -> Result<bool, StoreError>;
}
