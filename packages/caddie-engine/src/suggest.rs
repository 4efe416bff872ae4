use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use caddie_domain::{KnowledgeMatch, Language, Message, SenderType, Suggestion};

use crate::{Engine, EngineError, EngineResult, context, context::AssembleArgs};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestRequest {
	pub conversation_id: Uuid,
	pub channel_type: String,
	pub customer_message: String,
	/// Id of the already-persisted inbound message, when the caller has
	/// one. A fresh id is minted otherwise.
	#[serde(default)]
	pub message_id: Option<Uuid>,
	#[serde(default)]
	pub language: Option<Language>,
	/// Inline history, oldest first. When absent the stored conversation
	/// window is used.
	#[serde(default)]
	pub conversation_history: Option<Vec<HistoryMessage>>,
	#[serde(default)]
	pub retrieval: Option<RetrievalOverride>,
	/// When set, no state-changing backend call may occur. Mandatory for
	/// the evaluation harness and the staff preview path.
	#[serde(default)]
	pub dry_run: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryMessage {
	pub sender: SenderType,
	pub text: String,
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct RetrievalOverride {
	pub min_score: Option<f32>,
	pub top_k: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuggestResponse {
	pub suggestion_id: Uuid,
	pub suggested_response: String,
	pub function_called: Option<String>,
	pub function_parameters: Option<Value>,
	pub function_result: Option<Value>,
	pub context_summary: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub debug_info: Option<Value>,
}

impl Engine {
	/// The whole pipeline for one inbound message: assemble context, run
	/// the orchestrator, record the suggestion. Only invalid input and
	/// store failures surface as errors; model and executor trouble is
	/// absorbed into the recorded fallback reply.
	pub async fn suggest(&self, req: SuggestRequest) -> EngineResult<SuggestResponse> {
		if req.customer_message.trim().is_empty() {
			return Err(EngineError::InputInvalid {
				message: "customer_message must be non-empty.".to_string(),
			});
		}
		if req.channel_type.trim().is_empty() {
			return Err(EngineError::InputInvalid {
				message: "channel_type must be non-empty.".to_string(),
			});
		}

		let language = Language::detect(&req.customer_message, req.language);
		let retrieval = req.retrieval.unwrap_or_default();
		let min_score = retrieval.min_score.unwrap_or(self.cfg.retrieval.min_score);
		let top_k = retrieval.top_k.unwrap_or(self.cfg.retrieval.top_k);
		let now = OffsetDateTime::now_utc();
		let inline_history = req
			.conversation_history
			.map(|history| inline_to_messages(req.conversation_id, history, now));
		let bundle = self
			.assemble_context(AssembleArgs {
				conversation_id: req.conversation_id,
				text: &req.customer_message,
				inline_history,
				min_score,
				top_k,
			})
			.await?;
		let outcome =
			self.orchestrate(&bundle, &req.customer_message, language, req.dry_run).await;
		let supporting_matches: Vec<KnowledgeMatch> = bundle
			.matches
			.iter()
			.map(|scored| KnowledgeMatch { entry_id: scored.entry.id, score: scored.score })
			.collect();
		let suggestion = Suggestion {
			id: Uuid::new_v4(),
			conversation_id: req.conversation_id,
			triggering_message_id: req.message_id.unwrap_or_else(Uuid::new_v4),
			reply_text: outcome.reply_text.clone(),
			chosen_function: outcome.chosen_function.clone(),
			function_parameters: outcome.function_parameters.clone(),
			function_result: outcome.function_result.clone(),
			supporting_matches,
			model_exchange_log: outcome.exchange_log,
			created_at: OffsetDateTime::now_utc(),
		};

		self.stores.suggestions.append(suggestion.clone()).await?;

		tracing::info!(
			conversation_id = %req.conversation_id,
			suggestion_id = %suggestion.id,
			function = suggestion.chosen_function.as_deref().unwrap_or("none"),
			dry_run = req.dry_run,
			"Recorded suggestion."
		);

		let debug_info = serde_json::json!({
			"dry_run": req.dry_run,
			"language": language,
			"retrieval_degraded": bundle.degraded,
			"match_count": bundle.matches.len(),
		});

		Ok(SuggestResponse {
			suggestion_id: suggestion.id,
			suggested_response: suggestion.reply_text,
			function_called: suggestion.chosen_function,
			function_parameters: suggestion.function_parameters,
			function_result: suggestion.function_result,
			context_summary: context::context_summary(&bundle),
			debug_info: Some(debug_info),
		})
	}

	/// Read API for the staff UI, keyed by conversation, in creation
	/// order. Past suggestions are never mutated.
	pub async fn suggestions_for(&self, conversation_id: Uuid) -> EngineResult<Vec<Suggestion>> {
		Ok(self.stores.suggestions.for_conversation(conversation_id).await?)
	}
}

/// Inline history arrives oldest first; the context bundle wants most
/// recent first with synthetic timestamps that preserve the order.
fn inline_to_messages(
	conversation_id: Uuid,
	history: Vec<HistoryMessage>,
	now: OffsetDateTime,
) -> Vec<Message> {
	let count = history.len() as i64;

	let mut messages: Vec<Message> = history
		.into_iter()
		.enumerate()
		.map(|(index, item)| Message {
			id: Uuid::new_v4(),
			conversation_id,
			sender: item.sender,
			text: item.text,
			created_at: now - time::Duration::seconds(count - index as i64),
		})
		.collect();

	messages.reverse();

	messages
}
