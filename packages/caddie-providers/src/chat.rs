use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

const ATTEMPTS: u32 = 3;
const BACKOFF_MS: u64 = 250;

/// What the model decided: either free text, or exactly one function call.
/// When the response carries several tool calls only the first is honored.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatOutcome {
	Reply(String),
	Call { name: String, arguments: Value },
}

pub async fn complete(
	cfg: &caddie_config::ChatProviderConfig,
	messages: &[Value],
	tools: Option<&Value>,
) -> Result<ChatOutcome> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if let Some(tools) = tools {
		body["tools"] = tools.clone();
		body["tool_choice"] = Value::String("auto".to_string());
	}

	let mut last_err = None;

	for attempt in 0..ATTEMPTS {
		if attempt > 0 {
			tokio::time::sleep(Duration::from_millis(BACKOFF_MS << attempt)).await;
		}

		let sent = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await;
		let res = match sent {
			Ok(res) => res,
			Err(err) => {
				last_err = Some(err.into());

				continue;
			},
		};
		let json: Value = match res.error_for_status() {
			Ok(res) => res.json().await?,
			Err(err) => {
				last_err = Some(err.into());

				continue;
			},
		};

		match parse_chat_response(json) {
			Ok(outcome) => return Ok(outcome),
			Err(err) => {
				last_err = Some(err);
			},
		}
	}

	Err(last_err.unwrap_or_else(|| eyre::eyre!("Chat provider returned no response.")))
}

fn parse_chat_response(json: Value) -> Result<ChatOutcome> {
	let message = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.ok_or_else(|| eyre::eyre!("Chat response is missing a message."))?;

	if let Some(call) = message
		.get("tool_calls")
		.and_then(|v| v.as_array())
		.and_then(|calls| calls.first())
		.and_then(|call| call.get("function"))
	{
		let name = call
			.get("name")
			.and_then(|v| v.as_str())
			.ok_or_else(|| eyre::eyre!("Tool call is missing a function name."))?
			.to_string();
		let arguments = match call.get("arguments") {
			Some(Value::String(raw)) if raw.trim().is_empty() => Value::Object(Default::default()),
			Some(Value::String(raw)) => serde_json::from_str(raw)
				.map_err(|_| eyre::eyre!("Tool call arguments are not valid JSON."))?,
			Some(value) if value.is_object() => value.clone(),
			_ => Value::Object(Default::default()),
		};

		return Ok(ChatOutcome::Call { name, arguments });
	}

	let content = message
		.get("content")
		.and_then(|v| v.as_str())
		.ok_or_else(|| eyre::eyre!("Chat response has neither tool call nor content."))?;

	Ok(ChatOutcome::Reply(content.to_string()))
}
