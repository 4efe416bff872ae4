mod language;

pub use language::Language;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
	Customer,
	Staff,
	System,
}

/// One chat message. Immutable; a conversation is ordered by `created_at`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
	pub id: Uuid,
	pub conversation_id: Uuid,
	pub sender: SenderType,
	pub text: String,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
	pub id: Uuid,
	pub channel_type: String,
	pub customer_ref: String,
	pub last_message_text: String,
}

/// A curated bilingual Q&A entry. Editing question text must regenerate
/// its embeddings; the vectors always match the current text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeEntry {
	pub id: Uuid,
	pub category: String,
	pub questions_by_language: BTreeMap<Language, String>,
	pub answer: String,
	pub media_refs: Vec<String>,
	pub is_active: bool,
	pub usage_count: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
	Knowledge,
	Message,
}

/// One active vector per (owner, language). Replaced wholesale on edit,
/// never patched in place.
#[derive(Clone, Debug)]
pub struct EmbeddingRecord {
	pub owner_id: Uuid,
	pub owner_kind: OwnerKind,
	pub language: Language,
	pub vector: Vec<f32>,
	pub model_version: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
	pub entry_id: Uuid,
	pub score: f32,
}

/// The recorded output of one processed customer message. Immutable after
/// creation; a correction is a new message and a new suggestion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Suggestion {
	pub id: Uuid,
	pub conversation_id: Uuid,
	pub triggering_message_id: Uuid,
	pub reply_text: String,
	pub chosen_function: Option<String>,
	pub function_parameters: Option<Value>,
	pub function_result: Option<Value>,
	pub supporting_matches: Vec<KnowledgeMatch>,
	pub model_exchange_log: Vec<Value>,
	#[serde(with = "time::serde::rfc3339")]
	pub created_at: OffsetDateTime,
}

/// Harness-only comparison of a suggested action against the staff's
/// actual behavior. Never persisted to a production store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationRecord {
	pub test_case_id: String,
	pub expected_action: String,
	pub actual_action: String,
	pub matched: bool,
	pub rationale: String,
}
