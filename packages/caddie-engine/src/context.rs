use serde_json::Value;
use uuid::Uuid;

use caddie_domain::{KnowledgeEntry, Message, OwnerKind};

use crate::{Engine, EngineResult};

/// Everything the orchestrator gets to see for one inbound message.
pub struct ContextBundle {
	/// Most recent first.
	pub history: Vec<Message>,
	pub customer: Option<Value>,
	/// Descending by score, ties by entry id ascending.
	pub matches: Vec<ScoredEntry>,
	/// Set when the triggering text could not be embedded; the bundle is
	/// then best-effort with no knowledge matches.
	pub degraded: bool,
}

pub struct ScoredEntry {
	pub entry: KnowledgeEntry,
	pub score: f32,
}

pub(crate) struct AssembleArgs<'a> {
	pub(crate) conversation_id: Uuid,
	pub(crate) text: &'a str,
	pub(crate) inline_history: Option<Vec<Message>>,
	pub(crate) min_score: f32,
	pub(crate) top_k: u32,
}

impl Engine {
	pub(crate) async fn assemble_context(
		&self,
		args: AssembleArgs<'_>,
	) -> EngineResult<ContextBundle> {
		let history = match args.inline_history {
			Some(history) => history,
			None =>
				self.stores
					.conversations
					.recent_messages(
						args.conversation_id,
						self.cfg.retrieval.history_window,
					)
					.await?,
		};
		let customer = self.fetch_customer(args.conversation_id).await;
		let (matches, degraded) =
			self.knowledge_matches(args.text, args.min_score, args.top_k).await?;

		Ok(ContextBundle { history, customer, matches, degraded })
	}

	/// Best-effort: a missing customer or a backend hiccup never fails
	/// the suggestion.
	async fn fetch_customer(&self, conversation_id: Uuid) -> Option<Value> {
		let conversation = match self.stores.conversations.conversation(conversation_id).await {
			Ok(conversation) => conversation?,
			Err(err) => {
				tracing::debug!(error = %err, "Conversation fetch failed; continuing without customer context.");

				return None;
			},
		};

		if conversation.customer_ref.trim().is_empty() {
			return None;
		}

		match self.backend().customer_profile(&conversation.customer_ref).await {
			Ok(profile) => profile,
			Err(err) => {
				tracing::debug!(error = %err, "Customer profile fetch failed; continuing without it.");

				None
			},
		}
	}

	async fn knowledge_matches(
		&self,
		text: &str,
		min_score: f32,
		top_k: u32,
	) -> EngineResult<(Vec<ScoredEntry>, bool)> {
		let embedded = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &[text.to_string()])
			.await;
		let vector = match embedded {
			Ok(vectors) => vectors.into_iter().next(),
			Err(err) => {
				tracing::warn!(error = %err, "Embedding failed after retries; degrading to empty knowledge context.");

				return Ok((Vec::new(), true));
			},
		};
		let Some(vector) = vector else {
			tracing::warn!("Embedding provider returned no vector; degrading to empty knowledge context.");

			return Ok((Vec::new(), true));
		};
		let ranked = self
			.stores
			.embeddings
			.search(&vector, OwnerKind::Knowledge, top_k, min_score)
			.await?;
		let mut matches = Vec::with_capacity(ranked.len());

		for (entry_id, score) in ranked {
			let Some(entry) = self.stores.knowledge.get(entry_id).await? else {
				continue;
			};

			if !entry.is_active {
				continue;
			}

			matches.push(ScoredEntry { entry, score });
		}

		// The index already ranks; re-assert the contract after hydration.
		matches.sort_by(|a, b| {
			b.score
				.partial_cmp(&a.score)
				.unwrap_or(std::cmp::Ordering::Equal)
				.then_with(|| a.entry.id.cmp(&b.entry.id))
		});

		Ok((matches, false))
	}
}

pub fn context_summary(bundle: &ContextBundle) -> String {
	let best = bundle
		.matches
		.first()
		.map(|scored| format!("best {:.2}", scored.score))
		.unwrap_or_else(|| "none".to_string());
	let customer = if bundle.customer.is_some() { "present" } else { "absent" };
	let degraded = if bundle.degraded { ", retrieval degraded" } else { "" };

	format!(
		"{} history messages, customer context {customer}, {} knowledge matches ({best}){degraded}",
		bundle.history.len(),
		bundle.matches.len(),
	)
}
