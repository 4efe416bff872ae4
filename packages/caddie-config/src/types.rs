use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub backend: Backend,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub orchestrator: Orchestrator,
	pub catalog: Option<CatalogTuning>,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub chat: ChatProviderConfig,
	pub judge: ChatProviderConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Backend {
	pub api_base: String,
	pub api_key: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

/// Similarity search knobs. Defaults apply when the section or a key is
/// omitted; every value is overridable per call through the request.
#[derive(Clone, Debug, Deserialize)]
pub struct Retrieval {
	#[serde(default = "default_min_score")]
	pub min_score: f32,
	#[serde(default = "default_top_k")]
	pub top_k: u32,
	#[serde(default = "default_history_window")]
	pub history_window: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Orchestrator {
	#[serde(default = "default_max_rounds")]
	pub max_rounds: u32,
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
}

/// Trigger-hint vocabulary is tuning data, not code. Keys must name
/// catalog functions; values are appended to the built-in hints.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CatalogTuning {
	#[serde(default)]
	pub extra_trigger_hints: BTreeMap<String, Vec<String>>,
}

impl Default for Retrieval {
	fn default() -> Self {
		Self {
			min_score: default_min_score(),
			top_k: default_top_k(),
			history_window: default_history_window(),
		}
	}
}

impl Default for Orchestrator {
	fn default() -> Self {
		Self {
			max_rounds: default_max_rounds(),
			request_timeout_ms: default_request_timeout_ms(),
		}
	}
}

fn default_min_score() -> f32 {
	0.70
}

fn default_top_k() -> u32 {
	5
}

fn default_history_window() -> u32 {
	12
}

fn default_max_rounds() -> u32 {
	3
}

fn default_request_timeout_ms() -> u64 {
	12_000
}
