use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use uuid::Uuid;

use caddie_domain::{Conversation, EmbeddingRecord, KnowledgeEntry, Message, OwnerKind, Suggestion};

use crate::{
	BoxFuture, ConversationStore, EmbeddingIndex, Error, KnowledgeStore, Result, Stores,
	SuggestionStore, similarity,
};

/// Reference implementation of the storage contract. Backs tests, the
/// staff preview path, and the evaluation harness; a deployment
/// substitutes its relational+vector store behind the same traits.
#[derive(Default)]
pub struct MemoryStore {
	inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
	conversations: HashMap<Uuid, Conversation>,
	messages: Vec<Message>,
	knowledge: HashMap<Uuid, KnowledgeEntry>,
	embeddings: Vec<EmbeddingRecord>,
	suggestions: Vec<Suggestion>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stores(self: Arc<Self>) -> Stores {
		Stores {
			conversations: self.clone(),
			knowledge: self.clone(),
			embeddings: self.clone(),
			suggestions: self,
		}
	}

	pub async fn seed_conversation(&self, conversation: Conversation) {
		let mut inner = self.inner.write().await;

		inner.conversations.insert(conversation.id, conversation);
	}

	/// Test observability: every vector currently held for an owner.
	pub async fn embeddings_for(&self, owner_id: Uuid) -> Vec<EmbeddingRecord> {
		let inner = self.inner.read().await;

		inner.embeddings.iter().filter(|record| record.owner_id == owner_id).cloned().collect()
	}
}

impl ConversationStore for MemoryStore {
	fn conversation<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Conversation>>> {
		Box::pin(async move {
			let inner = self.inner.read().await;

			Ok(inner.conversations.get(&id).cloned())
		})
	}

	fn recent_messages<'a>(
		&'a self,
		conversation_id: Uuid,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<Message>>> {
		Box::pin(async move {
			let inner = self.inner.read().await;
			let mut messages: Vec<Message> = inner
				.messages
				.iter()
				.filter(|message| message.conversation_id == conversation_id)
				.cloned()
				.collect();

			messages.sort_by_key(|message| message.created_at);
			messages.reverse();
			messages.truncate(limit as usize);

			Ok(messages)
		})
	}

	fn append_message<'a>(&'a self, message: Message) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = self.inner.write().await;
			let conversation =
				inner.conversations.entry(message.conversation_id).or_insert_with(|| {
					Conversation {
						id: message.conversation_id,
						channel_type: String::new(),
						customer_ref: String::new(),
						last_message_text: String::new(),
					}
				});

			conversation.last_message_text = message.text.clone();

			inner.messages.push(message);

			Ok(())
		})
	}
}

impl KnowledgeStore for MemoryStore {
	fn insert<'a>(&'a self, entry: KnowledgeEntry) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = self.inner.write().await;

			if inner.knowledge.contains_key(&entry.id) {
				return Err(Error::Conflict(format!("Knowledge entry {} exists.", entry.id)));
			}

			inner.knowledge.insert(entry.id, entry);

			Ok(())
		})
	}

	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<KnowledgeEntry>>> {
		Box::pin(async move {
			let inner = self.inner.read().await;

			Ok(inner.knowledge.get(&id).cloned())
		})
	}

	fn update<'a>(&'a self, entry: KnowledgeEntry) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = self.inner.write().await;

			if !inner.knowledge.contains_key(&entry.id) {
				return Err(Error::NotFound(format!("Knowledge entry {}.", entry.id)));
			}

			inner.knowledge.insert(entry.id, entry);

			Ok(())
		})
	}

	fn remove<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = self.inner.write().await;

			if inner.knowledge.remove(&id).is_none() {
				return Err(Error::NotFound(format!("Knowledge entry {id}.")));
			}

			Ok(())
		})
	}

	fn list_active<'a>(&'a self) -> BoxFuture<'a, Result<Vec<KnowledgeEntry>>> {
		Box::pin(async move {
			let inner = self.inner.read().await;
			let mut entries: Vec<KnowledgeEntry> =
				inner.knowledge.values().filter(|entry| entry.is_active).cloned().collect();

			entries.sort_by_key(|entry| entry.id);

			Ok(entries)
		})
	}

	fn increment_usage<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = self.inner.write().await;
			let entry = inner
				.knowledge
				.get_mut(&id)
				.ok_or_else(|| Error::NotFound(format!("Knowledge entry {id}.")))?;

			entry.usage_count += 1;

			Ok(())
		})
	}
}

impl EmbeddingIndex for MemoryStore {
	fn upsert<'a>(&'a self, record: EmbeddingRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if record.vector.is_empty() {
				return Err(Error::InvalidArgument("Embedding vector is empty.".to_string()));
			}

			let mut inner = self.inner.write().await;

			// Replace, never patch: one active vector per (owner, language).
			inner.embeddings.retain(|existing| {
				existing.owner_id != record.owner_id || existing.language != record.language
			});
			inner.embeddings.push(record);

			Ok(())
		})
	}

	fn remove_owner<'a>(&'a self, owner_id: Uuid) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = self.inner.write().await;

			inner.embeddings.retain(|record| record.owner_id != owner_id);

			Ok(())
		})
	}

	fn search<'a>(
		&'a self,
		query: &'a [f32],
		scope: OwnerKind,
		top_k: u32,
		min_score: f32,
	) -> BoxFuture<'a, Result<Vec<(Uuid, f32)>>> {
		Box::pin(async move {
			let inner = self.inner.read().await;
			let mut best_by_owner: HashMap<Uuid, f32> = HashMap::new();

			for record in inner.embeddings.iter().filter(|record| record.owner_kind == scope) {
				let score = similarity::cosine(query, &record.vector);

				if score < min_score {
					continue;
				}

				let entry = best_by_owner.entry(record.owner_id).or_insert(score);

				if score > *entry {
					*entry = score;
				}
			}

			let mut ranked: Vec<(Uuid, f32)> = best_by_owner.into_iter().collect();

			ranked.sort_by(|a, b| {
				b.1.partial_cmp(&a.1)
					.unwrap_or(std::cmp::Ordering::Equal)
					.then_with(|| a.0.cmp(&b.0))
			});
			ranked.truncate(top_k as usize);

			Ok(ranked)
		})
	}
}

impl SuggestionStore for MemoryStore {
	fn append<'a>(&'a self, suggestion: Suggestion) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut inner = self.inner.write().await;

			if inner.suggestions.iter().any(|existing| existing.id == suggestion.id) {
				return Err(Error::Conflict(format!("Suggestion {} exists.", suggestion.id)));
			}

			inner.suggestions.push(suggestion);

			Ok(())
		})
	}

	fn get<'a>(&'a self, id: Uuid) -> BoxFuture<'a, Result<Option<Suggestion>>> {
		Box::pin(async move {
			let inner = self.inner.read().await;

			Ok(inner.suggestions.iter().find(|suggestion| suggestion.id == id).cloned())
		})
	}

	fn for_conversation<'a>(
		&'a self,
		conversation_id: Uuid,
	) -> BoxFuture<'a, Result<Vec<Suggestion>>> {
		Box::pin(async move {
			let inner = self.inner.read().await;

			Ok(inner
				.suggestions
				.iter()
				.filter(|suggestion| suggestion.conversation_id == conversation_id)
				.cloned()
				.collect())
		})
	}
}
