use std::time::Duration;

use serde_json::{Value, json};

use caddie_domain::{Language, SenderType};
use caddie_providers::chat::ChatOutcome;

use crate::{
	Engine,
	actions::{self, FailureKind},
	context::ContextBundle,
};

/// Terminal output of one orchestration run. Every input resolves here;
/// there is no error path out of the state machine.
pub struct OrchestratorOutcome {
	pub reply_text: String,
	pub chosen_function: Option<String>,
	pub function_parameters: Option<Value>,
	pub function_result: Option<Value>,
	pub exchange_log: Vec<Value>,
}

/// The chain is an explicit machine with a round counter so the
/// termination bound is structural rather than conventional.
enum Step {
	Start,
	ModelCall,
	Validate(ChatOutcome),
	Execute { name: String, arguments: Value },
	ChainDecision,
	Done(String),
}

impl Engine {
	pub(crate) async fn orchestrate(
		&self,
		bundle: &ContextBundle,
		customer_message: &str,
		language: Language,
		dry_run: bool,
	) -> OrchestratorOutcome {
		let timeout = Duration::from_millis(self.cfg.orchestrator.request_timeout_ms);
		let max_rounds = self.cfg.orchestrator.max_rounds;
		let tools = self.catalog().tools_json();
		let mut messages = build_messages(bundle, customer_message);
		let mut rounds = 0u32;
		let mut chosen: Option<(String, Value)> = None;
		let mut last_result: Option<Value> = None;
		let mut last_failure: Option<FailureKind> = None;
		let mut step = Step::Start;

		let reply_text = loop {
			step = match step {
				Step::Start => Step::ModelCall,
				Step::ModelCall => {
					if rounds >= max_rounds {
						tracing::warn!(rounds, "Chain limit exceeded; forcing fallback reply.");

						break fallback_reply(language, last_failure);
					}

					rounds += 1;

					let called = tokio::time::timeout(
						timeout,
						self.providers.chat.complete(
							&self.cfg.providers.chat,
							&messages,
							Some(&tools),
						),
					)
					.await;

					match called {
						Ok(Ok(outcome)) => Step::Validate(outcome),
						Ok(Err(err)) => {
							tracing::warn!(error = %err, "Model unavailable; falling back to a plain reply.");

							break fallback_reply(language, last_failure);
						},
						Err(_) => {
							tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Model call timed out; falling back to a plain reply.");

							break fallback_reply(language, last_failure);
						},
					}
				},
				Step::Validate(ChatOutcome::Reply(text)) => {
					messages.push(json!({ "role": "assistant", "content": text }));

					Step::Done(text)
				},
				Step::Validate(ChatOutcome::Call { name, arguments }) => {
					messages.push(json!({
						"role": "assistant",
						"content": Value::Null,
						"tool_call": { "name": name, "arguments": arguments },
					}));

					match self.catalog().validate_call(&name, &arguments) {
						Ok(()) => Step::Execute { name, arguments },
						Err(reason) => {
							// Never fabricate a valid call; log for catalog
							// tuning and answer in plain text instead.
							tracing::warn!(function = %name, %reason, "Function validation failed; executor not invoked.");

							last_failure = Some(FailureKind::Validation);

							break fallback_reply(language, last_failure);
						},
					}
				},
				Step::Execute { name, arguments } => {
					let result = match self.executors().get(&name) {
						Some(executor) => {
							let executed =
								tokio::time::timeout(timeout, executor.execute(&arguments, dry_run))
									.await;

							match executed {
								Ok(result) => result,
								Err(_) => Err(actions::ExecutionFailure {
									kind: FailureKind::UpstreamError,
									detail: "Backend call timed out.".to_string(),
								}),
							}
						},
						None => Err(actions::ExecutionFailure {
							kind: FailureKind::Validation,
							detail: format!("No executor registered for {name:?}."),
						}),
					};
					let result_json = actions::outcome_json(&result);

					if let Err(failure) = &result {
						tracing::info!(function = %name, kind = failure.kind.as_str(), detail = %failure.detail, "Executor reported a failure.");

						last_failure = Some(failure.kind);
					} else {
						last_failure = None;
					}

					messages.push(json!({
						"role": "tool",
						"name": name,
						"content": result_json.to_string(),
					}));

					chosen = Some((name, arguments));
					last_result = Some(result_json);

					Step::ChainDecision
				},
				// Give the model one more look so it can phrase the final
				// reply around the execution result.
				Step::ChainDecision => Step::ModelCall,
				Step::Done(text) => break text,
			};
		};

		let (chosen_function, function_parameters) = match chosen {
			Some((name, arguments)) => (Some(name), Some(arguments)),
			None => (None, None),
		};

		OrchestratorOutcome {
			reply_text,
			chosen_function,
			function_parameters,
			function_result: last_result,
			exchange_log: messages,
		}
	}
}

fn build_messages(bundle: &ContextBundle, customer_message: &str) -> Vec<Value> {
	let mut messages = vec![json!({ "role": "system", "content": system_prompt(bundle) })];

	// History arrives most recent first; the model wants it oldest first.
	for message in bundle.history.iter().rev() {
		let role = match message.sender {
			SenderType::Customer => "user",
			SenderType::Staff | SenderType::System => "assistant",
		};

		messages.push(json!({ "role": role, "content": message.text }));
	}

	messages.push(json!({ "role": "user", "content": customer_message }));

	messages
}

fn system_prompt(bundle: &ContextBundle) -> String {
	let mut prompt = String::from(
		"You draft replies for venue staff answering customer chat. Reply in the \
		customer's language. When the message warrants a backend action, call exactly \
		one of the provided functions; otherwise answer in plain text using the \
		reference answers below. Never invent availability or prices.",
	);

	if !bundle.matches.is_empty() {
		prompt.push_str("\n\nReference answers:");

		for scored in &bundle.matches {
			let question = scored
				.entry
				.questions_by_language
				.values()
				.next()
				.map(String::as_str)
				.unwrap_or("");

			prompt.push_str(&format!("\n- Q: {question}\n  A: {}", scored.entry.answer));
		}
	}
	if let Some(customer) = &bundle.customer {
		prompt.push_str(&format!("\n\nCustomer context: {customer}"));
	}

	prompt
}

/// Plain-language terminal replies. Raw internal errors never reach the
/// customer; the failure kind only shows up in the staff debug payload.
fn fallback_reply(language: Language, failure: Option<FailureKind>) -> String {
	match (language, failure) {
		(Language::En, Some(FailureKind::Conflict)) =>
			"That slot is no longer free. Can I offer you an alternative time nearby?".to_string(),
		(Language::Th, Some(FailureKind::Conflict)) =>
			"ขออภัยค่ะ ช่วงเวลานั้นเต็มแล้ว รบกวนเลือกเวลาอื่นใกล้เคียงได้ไหมคะ"
				.to_string(),
		(Language::En, Some(FailureKind::NotFound)) =>
			"I could not find that booking. Could you share the booking reference or the name it was made under?"
				.to_string(),
		(Language::Th, Some(FailureKind::NotFound)) =>
			"ไม่พบการจองค่ะ รบกวนแจ้งหมายเลขการจองหรือชื่อที่ใช้จองได้ไหมคะ"
				.to_string(),
		(Language::En, Some(FailureKind::Validation)) =>
			"Happy to help with that. Could you confirm the date and the exact start and end time?"
				.to_string(),
		(Language::Th, Some(FailureKind::Validation)) =>
			"ยินดีช่วยค่ะ รบกวนยืนยันวันที่และเวลาเริ่มและสิ้นสุดอีกครั้งค่ะ"
				.to_string(),
		(Language::En, _) =>
			"Thanks for your message. A teammate is taking a look and will get back to you shortly."
				.to_string(),
		(Language::Th, _) =>
			"ขอบคุณที่ติดต่อมาค่ะ ทีมงานกำลังตรวจสอบและจะรีบตอบกลับนะคะ"
				.to_string(),
	}
}
