//! Customer conversations and their messages.

use otadash_query::{query_key, Mutation, Query};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::{Patch, Resource, Update};
use crate::scope::FIVE_MINUTES;

const CONVERSATIONS: Resource = Resource::new("conversations", "/conversations");
const MESSAGES: Resource = Resource::new("messages", "/messages");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wilaya: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(deserialize_with = "crate::models::string_or_number")]
    pub id: String,
    pub merchant_id: String,
    pub customer_id: String,
    /// `whatsapp`, `facebook`, `instagram` or `telegram`.
    pub channel: String,
    /// `active`, `resolved` or `abandoned`.
    pub status: String,
    /// Cart and intent tracked by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub last_message_at: String,
    pub created_at: String,
    pub customer: Customer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "crate::models::string_or_number")]
    pub id: String,
    pub conversation_id: String,
    /// `customer`, `bot` or `agent`.
    pub sender_type: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_context: Option<Value>,
    pub created_at: String,
}

pub fn list() -> Query<Vec<Conversation>> {
    CONVERSATIONS.list()
}

pub fn get(id: &str) -> Query<Conversation> {
    CONVERSATIONS.get(id)
}

pub fn create() -> Mutation<Patch, Conversation> {
    CONVERSATIONS.create()
}

pub fn update() -> Mutation<Update<Patch>, Conversation> {
    CONVERSATIONS.update()
}

pub fn delete() -> Mutation<String, Value> {
    CONVERSATIONS.delete()
}

/// Messages of one conversation, keyed under the conversation.
pub fn messages(conversation_id: &str) -> Query<Vec<Message>> {
    Query::get(
        query_key!["conversations", conversation_id, "messages"],
        format!("{}/{}/messages", CONVERSATIONS.path, conversation_id),
    )
    .stale_time(FIVE_MINUTES)
    .enabled(!conversation_id.is_empty())
}

pub fn message(id: &str) -> Query<Message> {
    MESSAGES.get(id)
}

/// Post a message. Threads are refreshed on success.
pub fn send_message() -> Mutation<Patch, Message> {
    Mutation::post(MESSAGES.path)
        .invalidates(query_key![MESSAGES.name])
        .invalidates(query_key![CONVERSATIONS.name])
}

pub fn update_message() -> Mutation<Update<Patch>, Message> {
    MESSAGES.update()
}

pub fn delete_message() -> Mutation<String, Value> {
    MESSAGES.delete()
}
