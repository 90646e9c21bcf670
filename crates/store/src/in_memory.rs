//! In-memory record store — used by tests and ephemeral runs.

use async_trait::async_trait;
use forkreach_core::error::StoreError;
use forkreach_core::store::{
    ConversationRecord, ConversationWithMessages, DEFAULT_CONVERSATION_TITLE, DeviceId,
    MessageRecord, NewMessage, ProductInput, ProductRecord, RecordStore,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::MonotonicClock;

#[derive(Default)]
struct Tables {
    conversations: Vec<ConversationRecord>,
    messages: Vec<MessageRecord>,
    products: Vec<ProductRecord>,
}

/// Keeps every record in process memory. Contents vanish on drop.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    clock: MonotonicClock,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock: MonotonicClock::new(),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest `updated_at` first; the clock guarantees no ties.
fn newest_first<T>(rows: &mut [T], updated_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>) {
    rows.sort_by_key(|row| std::cmp::Reverse(updated_at(row)));
}

#[async_trait]
impl RecordStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_conversations(&self, device: &DeviceId) -> Result<Vec<ConversationRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ConversationRecord> = tables
            .conversations
            .iter()
            .filter(|c| &c.device_id == device)
            .cloned()
            .collect();
        newest_first(&mut rows, |c| c.updated_at);
        Ok(rows)
    }

    async fn create_conversation(
        &self,
        device: &DeviceId,
        title: Option<String>,
    ) -> Result<ConversationRecord, StoreError> {
        let now = self.clock.now();
        let record = ConversationRecord {
            id: Uuid::new_v4().to_string(),
            title: title.unwrap_or_else(|| DEFAULT_CONVERSATION_TITLE.into()),
            device_id: device.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.conversations.push(record.clone());
        Ok(record)
    }

    async fn get_conversation(
        &self,
        device: &DeviceId,
        id: &str,
    ) -> Result<Option<ConversationWithMessages>, StoreError> {
        let tables = self.tables.read().await;
        let Some(conversation) = tables
            .conversations
            .iter()
            .find(|c| c.id == id && &c.device_id == device)
        else {
            return Ok(None);
        };

        // Messages are appended in creation order
        let messages = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == id)
            .cloned()
            .collect();

        Ok(Some(ConversationWithMessages {
            conversation: conversation.clone(),
            messages,
        }))
    }

    async fn rename_conversation(
        &self,
        device: &DeviceId,
        id: &str,
        title: &str,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        Ok(tables
            .conversations
            .iter_mut()
            .find(|c| c.id == id && &c.device_id == device)
            .map(|c| {
                c.title = title.to_string();
                c.updated_at = now;
                c.clone()
            }))
    }

    async fn delete_conversation(&self, device: &DeviceId, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.conversations.len();
        tables
            .conversations
            .retain(|c| !(c.id == id && &c.device_id == device));
        if tables.conversations.len() == before {
            return Ok(false);
        }
        tables.messages.retain(|m| m.conversation_id != id);
        Ok(true)
    }

    async fn add_message(
        &self,
        device: &DeviceId,
        conversation_id: &str,
        message: NewMessage,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        let Some(conversation) = tables
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id && &c.device_id == device)
        else {
            return Ok(None);
        };
        conversation.updated_at = now;

        let record = MessageRecord {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: message.role,
            content: message.content,
            metadata: message.metadata,
            created_at: now,
        };
        tables.messages.push(record.clone());
        Ok(Some(record))
    }

    async fn list_products(&self, device: &DeviceId) -> Result<Vec<ProductRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<ProductRecord> = tables
            .products
            .iter()
            .filter(|p| &p.device_id == device)
            .cloned()
            .collect();
        newest_first(&mut rows, |p| p.updated_at);
        Ok(rows)
    }

    async fn get_product(&self, device: &DeviceId, id: &str) -> Result<Option<ProductRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .iter()
            .find(|p| p.id == id && &p.device_id == device)
            .cloned())
    }

    async fn upsert_product(&self, device: &DeviceId, input: ProductInput) -> Result<ProductRecord, StoreError> {
        let now = self.clock.now();
        let mut tables = self.tables.write().await;
        let key_features = input.key_features.unwrap_or_default();

        if let Some(existing) = tables
            .products
            .iter_mut()
            .find(|p| &p.device_id == device && p.name == input.name)
        {
            existing.tagline = input.tagline;
            existing.target_audience = input.target_audience;
            existing.key_features = key_features;
            existing.brand_voice = input.brand_voice;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let record = ProductRecord {
            id: Uuid::new_v4().to_string(),
            device_id: device.clone(),
            name: input.name,
            tagline: input.tagline,
            target_audience: input.target_audience,
            key_features,
            brand_voice: input.brand_voice,
            created_at: now,
            updated_at: now,
        };
        tables.products.push(record.clone());
        Ok(record)
    }

    async fn delete_product(&self, device: &DeviceId, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.products.len();
        tables
            .products
            .retain(|p| !(p.id == id && &p.device_id == device));
        Ok(tables.products.len() < before)
    }
}
