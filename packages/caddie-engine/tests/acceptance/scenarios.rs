use serde_json::json;

use caddie_domain::SenderType;
use caddie_engine::HistoryMessage;
use caddie_providers::chat::ChatOutcome;
use caddie_testkit::{InMemoryBookingApi, ScriptedChat, ScriptedTurn, Slot};

use super::{harness, harness_with, request, seed_bay_types};

#[tokio::test]
async fn knowledge_question_stays_conversational() {
	let fixture = harness(ScriptedChat::replying(
		"A social bay fits up to six guests with couches and a shared screen.",
	));
	let entry = seed_bay_types(&fixture.engine).await;
	let req = request("What is social bay?");
	let conversation_id = req.conversation_id;
	let response = fixture.engine.suggest(req).await.expect("Suggestion must succeed.");

	assert_eq!(response.function_called, None);
	assert_eq!(response.function_result, None);
	assert!(response.suggested_response.contains("social bay"));

	let recorded = fixture
		.engine
		.suggestions_for(conversation_id)
		.await
		.expect("Recorded suggestions must be readable.");
	let supporting = recorded
		.first()
		.expect("One suggestion must be recorded.")
		.supporting_matches
		.iter()
		.find(|supporting| supporting.entry_id == entry.id)
		.expect("The Bay Types entry must be among the matches.");

	assert!(supporting.score >= 0.70, "Expected a confident match, got {}", supporting.score);
}

#[tokio::test]
async fn availability_offer_plus_bare_time_confirms_booking() {
	let backend = InMemoryBookingApi::new();

	backend.add_slot(Slot {
		date: "2026-08-07".to_string(),
		start: "19:00".to_string(),
		end: "20:00".to_string(),
		bay_type: None,
		specialist: None,
	});

	let fixture = harness_with(
		ScriptedChat::new(vec![
			ScriptedTurn::Outcome(ChatOutcome::Call {
				name: "create_booking".to_string(),
				arguments: json!({ "start": "19:00", "end": "20:00" }),
			}),
			ScriptedTurn::Outcome(ChatOutcome::Reply(
				"Booked 19:00-20:00 for you ka! See you then.".to_string(),
			)),
		]),
		backend,
	);
	let mut req = request("Confirm 19.00-20.00 ka");

	req.conversation_history = Some(vec![HistoryMessage {
		sender: SenderType::Staff,
		text: "We have 19:00-20:00 available".to_string(),
	}]);

	let response = fixture.engine.suggest(req).await.expect("Suggestion must succeed.");

	assert_eq!(response.function_called.as_deref(), Some("create_booking"));

	let parameters = response.function_parameters.expect("Parameters must be recorded.");

	assert_eq!(parameters["start"], "19:00");
	assert_eq!(parameters["end"], "20:00");

	let result = response.function_result.expect("Result must be recorded.");

	assert_eq!(result["ok"], true);
	assert_eq!(fixture.backend.commit_count(), 1);
	assert!(response.suggested_response.contains("Booked"));
}

#[tokio::test]
async fn thai_cancel_request_resolves_to_booking_action() {
	let backend = InMemoryBookingApi::new();

	backend.add_booking("bk-77", "cust-9");

	let fixture = harness_with(
		ScriptedChat::new(vec![
			ScriptedTurn::Outcome(ChatOutcome::Call {
				name: "lookup_booking".to_string(),
				arguments: json!({ "customer_ref": "cust-9" }),
			}),
			ScriptedTurn::Outcome(ChatOutcome::Reply(
				"พบการจอง bk-77 ค่ะ ยืนยันยกเลิกไหมคะ".to_string(),
			)),
		]),
		backend,
	);
	let response = fixture.engine.suggest(request("ยกเลิก")).await.expect("Suggestion must succeed.");
	let called = response.function_called.as_deref().expect("An action must be chosen.");

	assert!(
		called == "lookup_booking" || called == "cancel_booking",
		"Unexpected action: {called}"
	);
	// Identifying the booking is read-only.
	assert_eq!(fixture.backend.commit_count(), 0);
}

#[tokio::test]
async fn booking_conflict_offers_an_alternative_not_a_raw_error() {
	// No slots seeded: every create attempt conflicts.
	let fixture = harness_with(
		ScriptedChat::new(vec![
			ScriptedTurn::Outcome(ChatOutcome::Call {
				name: "create_booking".to_string(),
				arguments: json!({ "start": "19:00", "end": "20:00" }),
			}),
			// The phrasing model is down too; the engine must still come
			// back with usable customer-facing text.
			ScriptedTurn::Unavailable,
		]),
		InMemoryBookingApi::new(),
	);
	let response = fixture
		.engine
		.suggest(request("Can I book 19:00-20:00 tonight?"))
		.await
		.expect("Suggestion must succeed.");
	let result = response.function_result.expect("Result must be recorded.");

	assert_eq!(result["ok"], false);
	assert_eq!(result["error_kind"], "CONFLICT");
	assert!(response.suggested_response.contains("alternative"));
	assert!(!response.suggested_response.contains("CONFLICT"));
	assert!(!response.suggested_response.contains("Conflict:"));
}
