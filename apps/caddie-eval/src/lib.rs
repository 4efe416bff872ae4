use std::{collections::BTreeMap, fs, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use caddie_config::{ACTION_NAMES, ChatProviderConfig, Config};
use caddie_domain::{EvaluationRecord, SenderType};
use caddie_engine::{Engine, HistoryMessage, HttpBookingBackend, KnowledgeInput, SuggestRequest};
use caddie_providers::judge::{self, CONVERSATIONAL, JudgeVerdict};
use caddie_store::{BoxFuture, memory::MemoryStore};

#[derive(Debug, Parser)]
#[command(
	version = caddie_cli::VERSION,
	rename_all = "kebab",
	styles = caddie_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'k', value_name = "FILE")]
	pub knowledge: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	#[arg(long, value_name = "N")]
	pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeSeed {
	entries: Vec<KnowledgeInput>,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	cases: Vec<EvalCase>,
}

#[derive(Clone, Debug, Deserialize)]
struct EvalCase {
	id: Option<String>,
	#[serde(default)]
	channel_type: Option<String>,
	#[serde(default)]
	history: Vec<EvalTurn>,
	customer_message: String,
	/// What the staff member actually sent back, for the judge.
	staff_reply: String,
	/// Explicit label; when present the judge model is skipped.
	#[serde(default)]
	expected_action: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct EvalTurn {
	sender: SenderType,
	text: String,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: DatasetInfo,
	summary: EvalSummary,
	records: Vec<EvaluationRecord>,
}

#[derive(Debug, Serialize)]
struct DatasetInfo {
	name: String,
	case_count: usize,
}

#[derive(Debug, Serialize)]
struct EvalSummary {
	accuracy: f64,
	matched: usize,
	total: usize,
	per_action: BTreeMap<String, ActionSummary>,
}

#[derive(Clone, Copy, Debug, Default, Serialize)]
struct ActionSummary {
	expected: usize,
	suggested: usize,
	matched: usize,
}

/// The judge is an untrusted classifier used only offline; its verdicts
/// never gate production behavior.
pub trait JudgeProvider
where
	Self: Send + Sync,
{
	fn classify<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		transcript: &'a str,
		vocabulary: &'a [&'a str],
	) -> BoxFuture<'a, color_eyre::Result<JudgeVerdict>>;
}

struct DefaultJudge;

impl JudgeProvider for DefaultJudge {
	fn classify<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		transcript: &'a str,
		vocabulary: &'a [&'a str],
	) -> BoxFuture<'a, color_eyre::Result<JudgeVerdict>> {
		Box::pin(judge::classify(cfg, transcript, vocabulary))
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = caddie_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let output = evaluate(&args, config, &DefaultJudge).await?;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

async fn evaluate(
	args: &Args,
	config: Config,
	judge: &dyn JudgeProvider,
) -> color_eyre::Result<EvalOutput> {
	let seed: KnowledgeSeed = serde_json::from_str(&fs::read_to_string(&args.knowledge)?)?;
	let dataset: EvalDataset = serde_json::from_str(&fs::read_to_string(&args.dataset)?)?;

	if dataset.cases.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one case."));
	}

	let judge_cfg = config.providers.judge.clone();
	// The harness runs against its own in-memory store; nothing it does
	// can leak into a production store, and dry-run keeps the backend
	// read-only.
	let store = Arc::new(MemoryStore::new());
	let backend = Arc::new(HttpBookingBackend::new(config.backend.clone()));
	let engine = Engine::new(config, store.stores(), backend);

	for entry in seed.entries {
		engine.create_knowledge(entry).await?;
	}

	let limit = args.limit.unwrap_or(dataset.cases.len());
	let mut records = Vec::new();

	for (index, case) in dataset.cases.iter().take(limit).enumerate() {
		let case_id = case.id.clone().unwrap_or_else(|| format!("case-{index}"));
		let (expected, rationale) = match &case.expected_action {
			Some(label) => (label.clone(), "Dataset label.".to_string()),
			None => {
				let transcript = render_transcript(case);
				let verdict = judge.classify(&judge_cfg, &transcript, &ACTION_NAMES).await?;

				(verdict.action, verdict.rationale)
			},
		};
		let response = engine
			.suggest(SuggestRequest {
				conversation_id: Uuid::new_v4(),
				channel_type: case.channel_type.clone().unwrap_or_else(|| "line".to_string()),
				customer_message: case.customer_message.clone(),
				message_id: None,
				language: None,
				conversation_history: Some(
					case.history
						.iter()
						.map(|turn| HistoryMessage { sender: turn.sender, text: turn.text.clone() })
						.collect(),
				),
				retrieval: None,
				dry_run: true,
			})
			.await?;
		let actual =
			response.function_called.unwrap_or_else(|| CONVERSATIONAL.to_string());

		tracing::debug!(case = %case_id, %expected, %actual, "Evaluated case.");

		records.push(EvaluationRecord {
			test_case_id: case_id,
			matched: expected == actual,
			expected_action: expected,
			actual_action: actual,
			rationale,
		});
	}

	let summary = summarize(&records);

	Ok(EvalOutput {
		dataset: DatasetInfo {
			name: dataset.name.unwrap_or_else(|| "eval".to_string()),
			case_count: records.len(),
		},
		summary,
		records,
	})
}

fn render_transcript(case: &EvalCase) -> String {
	let mut transcript = String::new();

	for turn in &case.history {
		transcript.push_str(&format!("{}: {}\n", sender_label(turn.sender), turn.text));
	}

	transcript.push_str(&format!("customer: {}\n", case.customer_message));
	transcript.push_str(&format!("staff: {}\n", case.staff_reply));

	transcript
}

fn sender_label(sender: SenderType) -> &'static str {
	match sender {
		SenderType::Customer => "customer",
		SenderType::Staff => "staff",
		SenderType::System => "system",
	}
}

fn summarize(records: &[EvaluationRecord]) -> EvalSummary {
	let total = records.len();
	let matched = records.iter().filter(|record| record.matched).count();
	let accuracy = if total == 0 { 0.0 } else { matched as f64 / total as f64 };

	let mut per_action: BTreeMap<String, ActionSummary> = BTreeMap::new();

	for record in records {
		let expected = per_action.entry(record.expected_action.clone()).or_default();

		expected.expected += 1;

		if record.matched {
			expected.matched += 1;
		}

		per_action.entry(record.actual_action.clone()).or_default().suggested += 1;
	}

	EvalSummary { accuracy, matched, total, per_action }
}
