use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use caddie_domain::{EmbeddingRecord, KnowledgeEntry, Language, OwnerKind};

use crate::{Engine, EngineError, EngineResult};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeInput {
	pub category: String,
	pub questions_by_language: BTreeMap<Language, String>,
	pub answer: String,
	#[serde(default)]
	pub media_refs: Vec<String>,
	#[serde(default = "default_active")]
	pub is_active: bool,
}

fn default_active() -> bool {
	true
}

impl Engine {
	/// Creates an entry and embeds every non-empty language variant before
	/// returning, so the entry is searchable the moment the call succeeds.
	pub async fn create_knowledge(&self, input: KnowledgeInput) -> EngineResult<KnowledgeEntry> {
		validate_input(&input)?;

		let entry = KnowledgeEntry {
			id: Uuid::new_v4(),
			category: input.category,
			questions_by_language: input.questions_by_language,
			answer: input.answer,
			media_refs: input.media_refs,
			is_active: input.is_active,
			usage_count: 0,
		};

		self.stores.knowledge.insert(entry.clone()).await?;
		self.reindex_entry(&entry).await?;

		Ok(entry)
	}

	/// Replaces the entry and its vectors. The old vectors are removed
	/// before the new ones land; an embedding never describes text that is
	/// no longer on the entry.
	pub async fn update_knowledge(
		&self,
		id: Uuid,
		input: KnowledgeInput,
	) -> EngineResult<KnowledgeEntry> {
		validate_input(&input)?;

		let existing = self
			.stores
			.knowledge
			.get(id)
			.await?
			.ok_or_else(|| EngineError::NotFound { message: format!("Knowledge entry {id}.") })?;
		let entry = KnowledgeEntry {
			id,
			category: input.category,
			questions_by_language: input.questions_by_language,
			answer: input.answer,
			media_refs: input.media_refs,
			is_active: input.is_active,
			usage_count: existing.usage_count,
		};

		self.stores.knowledge.update(entry.clone()).await?;
		self.stores.embeddings.remove_owner(id).await?;
		self.reindex_entry(&entry).await?;

		Ok(entry)
	}

	/// Removes the entry and every embedding record it owns.
	pub async fn delete_knowledge(&self, id: Uuid) -> EngineResult<()> {
		self.stores.embeddings.remove_owner(id).await?;
		self.stores.knowledge.remove(id).await?;

		Ok(())
	}

	pub async fn list_knowledge(&self) -> EngineResult<Vec<KnowledgeEntry>> {
		Ok(self.stores.knowledge.list_active().await?)
	}

	/// Staff accepted a suggestion; credit the knowledge entries that
	/// backed it. This is the only path that touches usage counters.
	pub async fn mark_suggestion_used(&self, suggestion_id: Uuid) -> EngineResult<()> {
		let suggestion =
			self.stores.suggestions.get(suggestion_id).await?.ok_or_else(|| {
				EngineError::NotFound { message: format!("Suggestion {suggestion_id}.") }
			})?;

		for supporting in &suggestion.supporting_matches {
			match self.stores.knowledge.increment_usage(supporting.entry_id).await {
				Ok(()) => {},
				// The entry may have been deleted since the suggestion was
				// recorded; that does not invalidate the acceptance.
				Err(caddie_store::Error::NotFound(_)) => {},
				Err(err) => return Err(err.into()),
			}
		}

		Ok(())
	}

	async fn reindex_entry(&self, entry: &KnowledgeEntry) -> EngineResult<()> {
		let variants: Vec<(Language, String)> = entry
			.questions_by_language
			.iter()
			.filter(|(_, question)| !question.trim().is_empty())
			.map(|(language, question)| (*language, question.clone()))
			.collect();

		if variants.is_empty() {
			return Ok(());
		}

		let texts: Vec<String> = variants.iter().map(|(_, question)| question.clone()).collect();
		let vectors =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if vectors.len() != variants.len() {
			return Err(EngineError::Provider {
				message: "Embedding provider returned a mismatched vector count.".to_string(),
			});
		}

		let model_version = crate::embedding_version(&self.cfg);

		for ((language, _), vector) in variants.into_iter().zip(vectors) {
			self.stores
				.embeddings
				.upsert(EmbeddingRecord {
					owner_id: entry.id,
					owner_kind: OwnerKind::Knowledge,
					language,
					vector,
					model_version: model_version.clone(),
				})
				.await?;
		}

		Ok(())
	}
}

fn validate_input(input: &KnowledgeInput) -> EngineResult<()> {
	if input.answer.trim().is_empty() {
		return Err(EngineError::InputInvalid { message: "answer must be non-empty.".to_string() });
	}
	if input.questions_by_language.values().all(|question| question.trim().is_empty()) {
		return Err(EngineError::InputInvalid {
			message: "At least one language variant must have question text.".to_string(),
		});
	}

	Ok(())
}
