use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Label a judge model may emit when no backend action applies.
pub const CONVERSATIONAL: &str = "conversational";

/// Untrusted classifier output. The rationale travels with the verdict so
/// a human can audit why the judge decided what it decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeVerdict {
	pub action: String,
	pub rationale: String,
}

pub async fn classify(
	cfg: &caddie_config::ChatProviderConfig,
	transcript: &str,
	vocabulary: &[&str],
) -> Result<JudgeVerdict> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let labels = {
		let mut labels = vec![CONVERSATIONAL];
		labels.extend_from_slice(vocabulary);
		labels.join(", ")
	};
	let messages = serde_json::json!([
		{
			"role": "system",
			"content": format!(
				"You classify what a support agent actually did in a chat transcript. \
				Answer with a JSON object {{\"action\": ..., \"rationale\": ...}} where \
				action is exactly one of: {labels}. Use \"{CONVERSATIONAL}\" when the \
				agent only replied with information."
			)
		},
		{ "role": "user", "content": transcript }
	]);

	for _ in 0..3 {
		let body = serde_json::json!({
			"model": cfg.model,
			"temperature": cfg.temperature,
			"messages": messages,
		});
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;
		if let Ok(verdict) = parse_judge_response(json, vocabulary) {
			return Ok(verdict);
		}
	}

	Err(eyre::eyre!("Judge response is not a valid classification."))
}

fn parse_judge_response(json: Value, vocabulary: &[&str]) -> Result<JudgeVerdict> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| eyre::eyre!("Judge response is missing content."))?;
	let parsed: Value = serde_json::from_str(content)
		.map_err(|_| eyre::eyre!("Judge content is not valid JSON."))?;
	let action = parsed
		.get("action")
		.and_then(|v| v.as_str())
		.ok_or_else(|| eyre::eyre!("Judge verdict is missing an action."))?;

	if action != CONVERSATIONAL && !vocabulary.contains(&action) {
		return Err(eyre::eyre!("Judge action {action:?} is outside the vocabulary."));
	}

	let rationale =
		parsed.get("rationale").and_then(|v| v.as_str()).unwrap_or_default().to_string();

	Ok(JudgeVerdict { action: action.to_string(), rationale })
}
