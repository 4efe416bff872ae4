use std::collections::BTreeMap;

use uuid::Uuid;

use caddie_domain::Language;
use caddie_engine::{EngineError, KnowledgeInput, RetrievalOverride};
use caddie_providers::chat::ChatOutcome;
use caddie_testkit::{ScriptedChat, ScriptedTurn};

use super::{harness, request, seed_bay_types};

fn input(question_en: &str, answer: &str) -> KnowledgeInput {
	let mut questions = BTreeMap::new();

	questions.insert(Language::En, question_en.to_string());

	KnowledgeInput {
		category: "policies".to_string(),
		questions_by_language: questions,
		answer: answer.to_string(),
		media_refs: Vec::new(),
		is_active: true,
	}
}

#[tokio::test]
async fn editing_question_text_refreshes_the_searchable_vector() {
	let fixture = harness(ScriptedChat::new(vec![
		ScriptedTurn::Outcome(ChatOutcome::Reply("We open at 10:00 every day.".to_string())),
		ScriptedTurn::Outcome(ChatOutcome::Reply("We open at 10:00 every day.".to_string())),
	]));
	let entry = fixture
		.engine
		.create_knowledge(input("Do you allow walk-in visits?", "We open at 10:00 every day."))
		.await
		.expect("Create must succeed.");

	fixture
		.engine
		.update_knowledge(entry.id, input("What are your opening hours?", "We open at 10:00 every day."))
		.await
		.expect("Update must succeed.");

	// The edited text must be an immediate high-score hit.
	let req = request("What are your opening hours?");
	let conversation_id = req.conversation_id;

	fixture.engine.suggest(req).await.expect("Suggestion must succeed.");

	let recorded = fixture
		.engine
		.suggestions_for(conversation_id)
		.await
		.expect("Recorded suggestions must be readable.");
	let supporting = recorded[0]
		.supporting_matches
		.iter()
		.find(|supporting| supporting.entry_id == entry.id)
		.expect("The edited entry must match its new text.");

	assert!(supporting.score >= 0.70);

	// The old text no longer matches: the stale vector is gone.
	let stale_req = request("Do you allow walk-in visits?");
	let stale_conversation = stale_req.conversation_id;

	fixture.engine.suggest(stale_req).await.expect("Suggestion must succeed.");

	let stale_recorded = fixture
		.engine
		.suggestions_for(stale_conversation)
		.await
		.expect("Recorded suggestions must be readable.");

	assert!(
		stale_recorded[0]
			.supporting_matches
			.iter()
			.all(|supporting| supporting.entry_id != entry.id),
		"Stale vector survived the edit."
	);

	// Exactly one vector per remaining language variant.
	assert_eq!(fixture.store.embeddings_for(entry.id).await.len(), 1);
}

#[tokio::test]
async fn delete_removes_entry_and_all_vectors() {
	let fixture = harness(ScriptedChat::replying("unused"));
	let entry = seed_bay_types(&fixture.engine).await;

	assert_eq!(fixture.store.embeddings_for(entry.id).await.len(), 2);

	fixture.engine.delete_knowledge(entry.id).await.expect("Delete must succeed.");

	assert!(fixture.store.embeddings_for(entry.id).await.is_empty());
	assert!(fixture.engine.list_knowledge().await.expect("List must succeed.").is_empty());
}

#[tokio::test]
async fn accepted_suggestion_credits_supporting_entries() {
	let fixture = harness(ScriptedChat::replying("A social bay fits up to six guests."));
	let entry = seed_bay_types(&fixture.engine).await;
	let req = request("What is social bay?");
	let response = fixture.engine.suggest(req).await.expect("Suggestion must succeed.");

	fixture
		.engine
		.mark_suggestion_used(response.suggestion_id)
		.await
		.expect("Marking used must succeed.");

	let refreshed = fixture
		.engine
		.list_knowledge()
		.await
		.expect("List must succeed.")
		.into_iter()
		.find(|candidate| candidate.id == entry.id)
		.expect("Entry must still exist.");

	assert_eq!(refreshed.usage_count, 1);
}

#[tokio::test]
async fn marking_an_unknown_suggestion_is_not_found() {
	let fixture = harness(ScriptedChat::replying("unused"));
	let result = fixture.engine.mark_suggestion_used(Uuid::new_v4()).await;

	assert!(matches!(result, Err(EngineError::NotFound { .. })));
}

#[tokio::test]
async fn per_call_threshold_override_narrows_retrieval() {
	let fixture = harness(ScriptedChat::replying("unused"));
	let _ = seed_bay_types(&fixture.engine).await;
	let mut req = request("What is social bay?");
	let conversation_id = req.conversation_id;

	req.retrieval = Some(RetrievalOverride { min_score: Some(0.99), top_k: None });

	fixture.engine.suggest(req).await.expect("Suggestion must succeed.");

	let recorded = fixture
		.engine
		.suggestions_for(conversation_id)
		.await
		.expect("Recorded suggestions must be readable.");

	assert!(recorded[0].supporting_matches.is_empty());
}

#[tokio::test]
async fn knowledge_without_any_question_text_is_rejected() {
	let fixture = harness(ScriptedChat::replying("unused"));
	let mut empty = input("", "Some answer.");

	empty.questions_by_language.insert(Language::Th, "  ".to_string());

	let result = fixture.engine.create_knowledge(empty).await;

	assert!(matches!(result, Err(EngineError::InputInvalid { .. })));
}
