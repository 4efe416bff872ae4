use serde_json::json;

use caddie_engine::EngineError;
use caddie_providers::chat::ChatOutcome;
use caddie_testkit::{InMemoryBookingApi, ScriptedChat, ScriptedTurn, Slot};

use super::{harness, harness_with, request};

fn seeded_backend() -> InMemoryBookingApi {
	let backend = InMemoryBookingApi::new();

	backend.add_slot(Slot {
		date: "2026-08-07".to_string(),
		start: "19:00".to_string(),
		end: "20:00".to_string(),
		bay_type: None,
		specialist: None,
	});

	backend
}

#[tokio::test]
async fn adversarial_model_terminates_at_the_round_bound() {
	let backend = InMemoryBookingApi::new();

	backend.add_booking("bk-1", "cust-1");

	// A model that asks for another round forever.
	let fixture = harness_with(
		ScriptedChat::repeating(ChatOutcome::Call {
			name: "lookup_booking".to_string(),
			arguments: json!({ "booking_ref": "bk-1" }),
		}),
		backend,
	);
	let response = fixture
		.engine
		.suggest(request("Where is my booking?"))
		.await
		.expect("Suggestion must succeed.");

	// max_rounds is 3 in the test config.
	assert_eq!(fixture.chat.calls(), 3);
	assert!(!response.suggested_response.is_empty());
	assert!(response.suggested_response.contains("teammate"));
	assert_eq!(response.function_called.as_deref(), Some("lookup_booking"));
}

#[tokio::test]
async fn invalid_function_call_falls_back_without_executing() {
	let fixture = harness_with(
		ScriptedChat::new(vec![ScriptedTurn::Outcome(ChatOutcome::Call {
			name: "create_booking".to_string(),
			arguments: json!({ "start": "19:00" }),
		})]),
		seeded_backend(),
	);
	let response = fixture
		.engine
		.suggest(request("Book me in tonight please"))
		.await
		.expect("Suggestion must succeed.");

	assert_eq!(response.function_called, None);
	assert_eq!(response.function_result, None);
	assert_eq!(fixture.backend.commit_count(), 0);
	assert!(response.suggested_response.contains("confirm the date"));
}

#[tokio::test]
async fn dry_run_commits_nothing_and_is_repeatable() {
	let fixture = harness_with(
		ScriptedChat::new(vec![
			ScriptedTurn::Outcome(ChatOutcome::Call {
				name: "create_booking".to_string(),
				arguments: json!({ "start": "19:00", "end": "20:00" }),
			}),
			ScriptedTurn::Outcome(ChatOutcome::Reply("The slot is free, shall I book it?".to_string())),
			ScriptedTurn::Outcome(ChatOutcome::Call {
				name: "create_booking".to_string(),
				arguments: json!({ "start": "19:00", "end": "20:00" }),
			}),
			ScriptedTurn::Outcome(ChatOutcome::Reply("The slot is free, shall I book it?".to_string())),
		]),
		seeded_backend(),
	);

	for _ in 0..2 {
		let mut req = request("Book 19:00-20:00");

		req.dry_run = true;

		let response = fixture.engine.suggest(req).await.expect("Suggestion must succeed.");
		let result = response.function_result.expect("Result must be recorded.");

		assert_eq!(result["ok"], true);
		assert_eq!(result["data"]["dry_run"], true);
	}

	assert_eq!(fixture.backend.commit_count(), 0);
	assert_eq!(fixture.backend.slot_count(), 1);
}

#[tokio::test]
async fn model_outage_still_yields_a_recorded_fallback() {
	let fixture = harness(ScriptedChat::new(vec![ScriptedTurn::Unavailable]));
	let req = request("Hello?");
	let conversation_id = req.conversation_id;
	let response = fixture.engine.suggest(req).await.expect("Suggestion must succeed.");

	assert_eq!(response.function_called, None);
	assert!(response.suggested_response.contains("teammate"));

	let recorded = fixture
		.engine
		.suggestions_for(conversation_id)
		.await
		.expect("Recorded suggestions must be readable.");

	assert_eq!(recorded.len(), 1);
	assert_eq!(recorded[0].reply_text, response.suggested_response);
}

#[tokio::test]
async fn backend_outage_surfaces_as_upstream_error_kind() {
	let backend = seeded_backend();

	backend.set_fail_upstream(true);

	let fixture = harness_with(
		ScriptedChat::new(vec![
			ScriptedTurn::Outcome(ChatOutcome::Call {
				name: "check_availability".to_string(),
				arguments: json!({ "date": "2026-08-07" }),
			}),
			ScriptedTurn::Unavailable,
		]),
		backend,
	);
	let response = fixture
		.engine
		.suggest(request("Anything free tomorrow?"))
		.await
		.expect("Suggestion must succeed.");
	let result = response.function_result.expect("Result must be recorded.");

	assert_eq!(result["ok"], false);
	assert_eq!(result["error_kind"], "UPSTREAM_ERROR");
	// The customer-facing text never carries the raw failure.
	assert!(!response.suggested_response.contains("UPSTREAM"));
	assert!(response.suggested_response.contains("teammate"));
}

#[tokio::test]
async fn blank_input_is_rejected_before_any_model_call() {
	let fixture = harness(ScriptedChat::replying("unused"));
	let result = fixture.engine.suggest(request("   ")).await;

	assert!(matches!(result, Err(EngineError::InputInvalid { .. })));
	assert_eq!(fixture.chat.calls(), 0);
}

#[tokio::test]
async fn suggestions_accumulate_in_message_order() {
	let fixture = harness(ScriptedChat::new(vec![
		ScriptedTurn::Outcome(ChatOutcome::Reply("first reply".to_string())),
		ScriptedTurn::Outcome(ChatOutcome::Reply("second reply".to_string())),
	]));
	let mut req = request("first question");
	let conversation_id = req.conversation_id;

	fixture.engine.suggest(req.clone()).await.expect("First suggestion must succeed.");

	req.customer_message = "second question".to_string();

	fixture.engine.suggest(req).await.expect("Second suggestion must succeed.");

	let recorded = fixture
		.engine
		.suggestions_for(conversation_id)
		.await
		.expect("Recorded suggestions must be readable.");

	assert_eq!(recorded.len(), 2);
	assert_eq!(recorded[0].reply_text, "first reply");
	assert_eq!(recorded[1].reply_text, "second reply");
}
