use std::{collections::BTreeMap, sync::Arc};

use axum::{
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Map;
use tower::util::ServiceExt;

use caddie_api::{routes, state::AppState};
use caddie_config::{
	Backend, ChatProviderConfig, Config, EmbeddingProviderConfig, Orchestrator,
	Providers as ProviderConfigs, Retrieval, Service,
};
use caddie_domain::Language;
use caddie_engine::{Engine, Providers};
use caddie_store::memory::MemoryStore;
use caddie_testkit::{FakeEmbedder, InMemoryBookingApi, ScriptedChat};

fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "test-embed".to_string(),
				dimensions: 64,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			chat: dummy_chat_provider(),
			judge: dummy_chat_provider(),
		},
		backend: Backend {
			api_base: "http://127.0.0.1:1".to_string(),
			api_key: "test-key".to_string(),
			timeout_ms: 1_000,
			default_headers: Map::new(),
		},
		retrieval: Retrieval { min_score: 0.70, top_k: 5, history_window: 12 },
		orchestrator: Orchestrator { max_rounds: 3, request_timeout_ms: 2_000 },
		catalog: None,
	}
}

fn dummy_chat_provider() -> ChatProviderConfig {
	ChatProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: "test-key".to_string(),
		path: "/v1/chat/completions".to_string(),
		model: "test-chat".to_string(),
		temperature: 0.2,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn test_state(chat: ScriptedChat) -> AppState {
	let store = Arc::new(MemoryStore::new());
	let backend = Arc::new(InMemoryBookingApi::new());
	let providers = Providers::new(Arc::new(FakeEmbedder), Arc::new(chat));
	let engine = Engine::with_providers(test_config(), store.stores(), backend, providers);

	AppState::with_engine(engine)
}

#[tokio::test]
async fn health_ok() {
	let app = routes::router(test_state(ScriptedChat::replying("unused")));
	let response = app
		.oneshot(
			Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn suggest_round_trips_through_the_engine() {
	let app = routes::router(test_state(ScriptedChat::replying("Happy to help!")));
	let payload = serde_json::json!({
		"conversation_id": uuid::Uuid::new_v4(),
		"channel_type": "line",
		"customer_message": "Hello there",
	});
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/suggestions")
				.header("content-type", "application/json")
				.body(Body::from(payload.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call suggest.");

	assert_eq!(response.status(), StatusCode::OK);

	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json: serde_json::Value = serde_json::from_slice(&bytes).expect("Failed to parse response.");

	assert_eq!(json["suggested_response"], "Happy to help!");
	assert_eq!(json["function_called"], serde_json::Value::Null);
}

#[tokio::test]
async fn blank_message_maps_to_input_invalid() {
	let app = routes::router(test_state(ScriptedChat::replying("unused")));
	let payload = serde_json::json!({
		"conversation_id": uuid::Uuid::new_v4(),
		"channel_type": "line",
		"customer_message": "   ",
	});
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/suggestions")
				.header("content-type", "application/json")
				.body(Body::from(payload.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call suggest.");

	assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json: serde_json::Value = serde_json::from_slice(&bytes).expect("Failed to parse response.");

	assert_eq!(json["error_code"], "INPUT_INVALID");
}

#[tokio::test]
async fn knowledge_create_is_immediately_searchable() {
	let state = test_state(ScriptedChat::replying("A social bay fits up to six guests."));
	let app = routes::router(state.clone());
	let mut questions = BTreeMap::new();

	questions.insert(Language::En, "What is a social bay?".to_string());

	let create = serde_json::json!({
		"category": "Bay Types",
		"questions_by_language": questions,
		"answer": "A social bay fits up to six guests.",
	});
	let created = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/knowledge")
				.header("content-type", "application/json")
				.body(Body::from(create.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call knowledge create.");

	assert_eq!(created.status(), StatusCode::OK);

	let suggest = serde_json::json!({
		"conversation_id": uuid::Uuid::new_v4(),
		"channel_type": "line",
		"customer_message": "What is social bay?",
	});
	let response = routes::router(state)
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/suggestions")
				.header("content-type", "application/json")
				.body(Body::from(suggest.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call suggest.");

	assert_eq!(response.status(), StatusCode::OK);

	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json: serde_json::Value = serde_json::from_slice(&bytes).expect("Failed to parse response.");

	assert_eq!(json["debug_info"]["match_count"], 1);
}

#[tokio::test]
async fn marking_an_unknown_suggestion_is_404() {
	let app = routes::router(test_state(ScriptedChat::replying("unused")));
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri(format!("/v1/suggestions/{}/used", uuid::Uuid::new_v4()))
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call mark used.");

	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
