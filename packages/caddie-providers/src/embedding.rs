use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

// Embedding is read-only, so transient transport failures are safe to
// retry a few times before the caller degrades.
const ATTEMPTS: u32 = 3;
const BACKOFF_MS: u64 = 200;

pub async fn embed(
	cfg: &caddie_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});

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

		match res.error_for_status() {
			Ok(res) => {
				let json: Value = res.json().await?;

				return parse_embedding_response(json);
			},
			Err(err) => {
				last_err = Some(err.into());
			},
		}
	}

	Err(last_err.unwrap_or_else(|| eyre::eyre!("Embedding provider returned no response.")))
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;

	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(fallback_index);
		let embedding = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Embedding item missing embedding array."))?;
		let mut vec = Vec::with_capacity(embedding.len());
		for value in embedding {
			let number =
				value.as_f64().ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))?;
			vec.push(number as f32);
		}
		indexed.push((index, vec));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}
