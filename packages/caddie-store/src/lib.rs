pub mod memory;
pub mod similarity;

use std::{future::Future, pin::Pin, sync::Arc};

use uuid::Uuid;

use caddie_domain::{Conversation, EmbeddingRecord, KnowledgeEntry, Message, OwnerKind, Suggestion};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Failure surface shared by every store implementation. The production
/// relational+vector store lives outside this workspace; these traits are
/// the contract it has to satisfy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("{0}")]
	Message(String),
}

pub trait ConversationStore: Send + Sync {
	fn conversation<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Conversation>>>;
	/// Bounded window of prior messages, most recent first.
	fn recent_messages<'a>(
		&'a self,
		conversation_id: Uuid,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Message>>>;
	/// Appends the message and advances the conversation's last message
	/// text. Messages are never edited or removed.
	fn append_message<'a>(&'a self, message: Message) -> BoxFuture<'a, Result<()>>;
}

pub trait KnowledgeStore: Send + Sync {
	fn insert<'a>(&'a self, entry: KnowledgeEntry) -> BoxFuture<'a, Result<()>>;
	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<KnowledgeEntry>>>;
	fn update<'a>(&'a self, entry: KnowledgeEntry) -> BoxFuture<'a, Result<()>>;
	fn remove<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<()>>;
	fn list_active<'a>(&'a self) -> BoxFuture<'a, Result<Vec<KnowledgeEntry>>>;
	fn increment_usage<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<()>>;
}

pub trait EmbeddingIndex: Send + Sync {
	/// Replaces any prior vector for the record's (owner, language).
	fn upsert<'a>(&'a self, record: EmbeddingRecord) -> BoxFuture<'a, Result<()>>;
	fn remove_owner<'a>(&'a self, owner_id: Uuid) -> BoxFuture<'a, Result<()>>;
	/// Cosine nearest neighbors within one owner kind: score >= min_score,
	/// at most top_k, descending by score, ties by owner id ascending, one
	/// row per owner (best language wins).
	fn search<'a>(
		&'a self,
		query: &'a [f32],
		scope: OwnerKind,
		top_k: u32,
		min_score: f32,
	) -> BoxFuture<'a, Result<Vec<(Uuid, f32)>>>;
}

pub trait SuggestionStore: Send + Sync {
	fn append<'a>(&'a self, suggestion: Suggestion) -> BoxFuture<'a, Result<()>>;
	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Suggestion>>>;
	fn for_conversation<'a>(
		&'a self,
		conversation_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Suggestion>>>;
}

#[derive(Clone)]
pub struct Stores {
	pub conversations: Arc<dyn ConversationStore>,
	pub knowledge: Arc<dyn KnowledgeStore>,
	pub embeddings: Arc<dyn EmbeddingIndex>,
	pub suggestions: Arc<dyn SuggestionStore>,
}
