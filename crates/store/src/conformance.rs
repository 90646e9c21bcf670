//! Behaviour every `RecordStore` backend must share.

use forkreach_core::context::BrandVoice;
use forkreach_core::store::{DEFAULT_CONVERSATION_TITLE, DeviceId, NewMessage, ProductInput, RecordStore};

fn device(raw: &str) -> DeviceId {
    DeviceId::parse(raw).unwrap()
}

fn message(role: &str, content: &str) -> NewMessage {
    NewMessage {
        role: role.into(),
        content: content.into(),
        metadata: Default::default(),
    }
}

fn product(name: &str, tagline: Option<&str>) -> ProductInput {
    ProductInput {
        name: name.into(),
        tagline: tagline.map(str::to_string),
        target_audience: None,
        key_features: None,
        brand_voice: BrandVoice::default(),
    }
}

pub async fn conversation_lifecycle(store: &dyn RecordStore) {
    let dev = device("dev-1");

    let conv = store.create_conversation(&dev, None).await.unwrap();
    assert_eq!(conv.title, DEFAULT_CONVERSATION_TITLE);
    assert_eq!(conv.created_at, conv.updated_at);

    let mut metadata = serde_json::Map::new();
    metadata.insert("model".into(), serde_json::json!("gemini-2.5-flash"));
    store.add_message(&dev, &conv.id, message("user", "hello")).await.unwrap().unwrap();
    let reply = store
        .add_message(
            &dev,
            &conv.id,
            NewMessage {
                role: "assistant".into(),
                content: "hi!".into(),
                metadata,
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.conversation_id, conv.id);

    let full = store.get_conversation(&dev, &conv.id).await.unwrap().unwrap();
    let contents: Vec<&str> = full.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "hi!"]);
    assert_eq!(full.messages[1].metadata["model"], "gemini-2.5-flash");
    assert!(full.conversation.updated_at > conv.updated_at);

    let renamed = store
        .rename_conversation(&dev, &conv.id, "Launch plan")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.title, "Launch plan");
    assert!(renamed.updated_at > full.conversation.updated_at);

    assert!(store.delete_conversation(&dev, &conv.id).await.unwrap());
    assert!(store.get_conversation(&dev, &conv.id).await.unwrap().is_none());
    assert!(!store.delete_conversation(&dev, &conv.id).await.unwrap());
    assert!(store.add_message(&dev, &conv.id, message("user", "x")).await.unwrap().is_none());
}

pub async fn listing_follows_activity(store: &dyn RecordStore) {
    let dev = device("dev-1");
    let first = store.create_conversation(&dev, Some("first".into())).await.unwrap();
    let second = store.create_conversation(&dev, Some("second".into())).await.unwrap();

    let titles = |rows: Vec<forkreach_core::store::ConversationRecord>| {
        rows.into_iter().map(|c| c.title).collect::<Vec<_>>()
    };

    assert_eq!(titles(store.list_conversations(&dev).await.unwrap()), vec!["second", "first"]);

    store.add_message(&dev, &first.id, message("user", "bump")).await.unwrap();
    assert_eq!(titles(store.list_conversations(&dev).await.unwrap()), vec!["first", "second"]);

    store.rename_conversation(&dev, &second.id, "second!").await.unwrap();
    assert_eq!(titles(store.list_conversations(&dev).await.unwrap()), vec!["second!", "first"]);
}

pub async fn devices_are_isolated(store: &dyn RecordStore) {
    let owner = device("owner");
    let other = device("other");

    let conv = store.create_conversation(&owner, None).await.unwrap();
    let prod = store.upsert_product(&owner, product("DevTodo", None)).await.unwrap();

    assert!(store.list_conversations(&other).await.unwrap().is_empty());
    assert!(store.get_conversation(&other, &conv.id).await.unwrap().is_none());
    assert!(store.rename_conversation(&other, &conv.id, "x").await.unwrap().is_none());
    assert!(store.add_message(&other, &conv.id, message("user", "x")).await.unwrap().is_none());
    assert!(!store.delete_conversation(&other, &conv.id).await.unwrap());

    assert!(store.list_products(&other).await.unwrap().is_empty());
    assert!(store.get_product(&other, &prod.id).await.unwrap().is_none());
    assert!(!store.delete_product(&other, &prod.id).await.unwrap());

    // Same name under another device is a separate product
    let theirs = store.upsert_product(&other, product("DevTodo", None)).await.unwrap();
    assert_ne!(theirs.id, prod.id);

    assert_eq!(store.get_conversation(&owner, &conv.id).await.unwrap().unwrap().conversation.title, "New Chat");
    assert_eq!(store.list_products(&owner).await.unwrap().len(), 1);
}

pub async fn product_upsert_by_name(store: &dyn RecordStore) {
    let dev = device("dev-1");

    let created = store.upsert_product(&dev, product("DevTodo", Some("v1"))).await.unwrap();
    assert_eq!(created.brand_voice, BrandVoice::Casual);
    assert!(created.key_features.is_empty());

    let other = store.upsert_product(&dev, product("Shipyard", None)).await.unwrap();

    let updated = store
        .upsert_product(
            &dev,
            ProductInput {
                key_features: Some(vec!["Sync".into(), "CLI".into()]),
                brand_voice: BrandVoice::Playful,
                ..product("DevTodo", Some("v2"))
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.tagline.as_deref(), Some("v2"));
    assert_eq!(updated.key_features, vec!["Sync", "CLI"]);
    assert_eq!(updated.brand_voice, BrandVoice::Playful);

    let listed: Vec<String> = store
        .list_products(&dev)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(listed, vec!["DevTodo", "Shipyard"]);

    let fetched = store.get_product(&dev, &created.id).await.unwrap().unwrap();
    assert_eq!(fetched.to_session_context().brand_voice, Some(BrandVoice::Playful));

    assert!(store.delete_product(&dev, &other.id).await.unwrap());
    assert!(store.get_product(&dev, &other.id).await.unwrap().is_none());
    assert!(!store.delete_product(&dev, &other.id).await.unwrap());
}
