//! Device-scoped conversation and product endpoints.
//!
//! Every route requires `X-Device-Id`. Rows that belong to another device
//! answer exactly like missing rows (404).

use axum::Json;
use axum::extract::{Path, State};
use forkreach_core::store::{
    ConversationRecord, ConversationWithMessages, MessageRecord, NewMessage, ProductInput,
    ProductRecord,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::SharedState;
use crate::device::Device;
use crate::error::ApiError;

// ── Conversations ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversation {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConversation {
    pub title: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

pub async fn list_conversations(
    State(state): State<SharedState>,
    Device(device): Device,
) -> Result<Json<Vec<ConversationRecord>>, ApiError> {
    Ok(Json(state.store.list_conversations(&device).await?))
}

/// An empty body creates a conversation with the default title.
pub async fn create_conversation(
    State(state): State<SharedState>,
    Device(device): Device,
    body: Option<Json<CreateConversation>>,
) -> Result<Json<ConversationRecord>, ApiError> {
    let title = body.and_then(|Json(body)| body.title);
    let record = state.store.create_conversation(&device, title).await?;
    info!(conversation = %record.id, "Conversation created");
    Ok(Json(record))
}

pub async fn get_conversation(
    State(state): State<SharedState>,
    Device(device): Device,
    Path(id): Path<String>,
) -> Result<Json<ConversationWithMessages>, ApiError> {
    state
        .store
        .get_conversation(&device, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Conversation"))
}

pub async fn update_conversation(
    State(state): State<SharedState>,
    Device(device): Device,
    Path(id): Path<String>,
    Json(body): Json<UpdateConversation>,
) -> Result<Json<ConversationRecord>, ApiError> {
    state
        .store
        .rename_conversation(&device, &id, &body.title)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Conversation"))
}

pub async fn delete_conversation(
    State(state): State<SharedState>,
    Device(device): Device,
    Path(id): Path<String>,
) -> Result<Json<StatusMessage>, ApiError> {
    if !state.store.delete_conversation(&device, &id).await? {
        return Err(ApiError::not_found("Conversation"));
    }
    Ok(Json(StatusMessage {
        message: "Conversation deleted".into(),
    }))
}

pub async fn add_message(
    State(state): State<SharedState>,
    Device(device): Device,
    Path(id): Path<String>,
    Json(body): Json<NewMessage>,
) -> Result<Json<MessageRecord>, ApiError> {
    state
        .store
        .add_message(&device, &id, body)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Conversation"))
}

// ── Products ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SavedProduct {
    pub product: ProductRecord,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

pub async fn list_products(
    State(state): State<SharedState>,
    Device(device): Device,
) -> Result<Json<ProductList>, ApiError> {
    Ok(Json(ProductList {
        products: state.store.list_products(&device).await?,
    }))
}

pub async fn get_product(
    State(state): State<SharedState>,
    Device(device): Device,
    Path(id): Path<String>,
) -> Result<Json<ProductRecord>, ApiError> {
    state
        .store
        .get_product(&device, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product"))
}

/// Creates the product, or updates the device's product with the same name.
pub async fn save_product(
    State(state): State<SharedState>,
    Device(device): Device,
    Json(body): Json<ProductInput>,
) -> Result<Json<SavedProduct>, ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Product name must not be empty".into()));
    }
    let product = state.store.upsert_product(&device, body).await?;
    info!(product = %product.id, name = %product.name, "Product saved");
    Ok(Json(SavedProduct { product }))
}

pub async fn delete_product(
    State(state): State<SharedState>,
    Device(device): Device,
    Path(id): Path<String>,
) -> Result<Json<Deleted>, ApiError> {
    if !state.store.delete_product(&device, &id).await? {
        return Err(ApiError::not_found("Product"));
    }
    Ok(Json(Deleted { deleted: true }))
}
