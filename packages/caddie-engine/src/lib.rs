pub mod actions;
pub mod catalog;
pub mod context;
pub mod knowledge;
pub mod orchestrate;
pub mod suggest;

use std::sync::Arc;

use serde_json::Value;

use caddie_config::{ChatProviderConfig, Config, EmbeddingProviderConfig};
use caddie_providers::{booking, booking::BookingError, chat, chat::ChatOutcome, embedding};
use caddie_store::{BoxFuture, Stores};

pub use actions::{BookingBackend, ExecutionFailure, Executors, FailureKind};
pub use catalog::Catalog;
pub use knowledge::KnowledgeInput;
pub use suggest::{HistoryMessage, RetrievalOverride, SuggestRequest, SuggestResponse};

pub type EngineResult<T> = Result<T, EngineError>;

/// Failures the engine surfaces to its caller. Everything else (model
/// outages, executor failures, chain limits) resolves locally into a
/// fallback reply inside a valid Suggestion.
#[derive(Debug)]
pub enum EngineError {
	InputInvalid { message: String },
	NotFound { message: String },
	Provider { message: String },
	Store { message: String },
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		messages: &'a [Value],
		tools: Option<&'a Value>,
	) -> BoxFuture<'a, color_eyre::Result<ChatOutcome>>;
}

/// Injected model clients. Never a process-wide singleton: tests and the
/// evaluation harness substitute fakes without state bleed.
#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub chat: Arc<dyn ChatProvider>,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a ChatProviderConfig,
		messages: &'a [Value],
		tools: Option<&'a Value>,
	) -> BoxFuture<'a, color_eyre::Result<ChatOutcome>> {
		Box::pin(chat::complete(cfg, messages, tools))
	}
}

impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, chat: Arc<dyn ChatProvider>) -> Self {
		Self { embedding, chat }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self { embedding: provider.clone(), chat: provider }
	}
}

/// Default booking backend: JSON POSTs against the configured service.
pub struct HttpBookingBackend {
	cfg: caddie_config::Backend,
}

impl HttpBookingBackend {
	pub fn new(cfg: caddie_config::Backend) -> Self {
		Self { cfg }
	}
}

impl BookingBackend for HttpBookingBackend {
	fn check_availability<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(booking::call(&self.cfg, booking::AVAILABILITY_PATH, params))
	}

	fn create_booking<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(booking::call(&self.cfg, booking::CREATE_BOOKING_PATH, params))
	}

	fn cancel_booking<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(booking::call(&self.cfg, booking::CANCEL_BOOKING_PATH, params))
	}

	fn lookup_booking<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(booking::call(&self.cfg, booking::LOOKUP_BOOKING_PATH, params))
	}

	fn specialist_availability<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(booking::call(&self.cfg, booking::SPECIALIST_AVAILABILITY_PATH, params))
	}

	fn customer_profile<'a>(
		&'a self,
		customer_ref: &'a str,
	) -> BoxFuture<'a, Result<Option<Value>, BookingError>> {
		Box::pin(async move {
			let payload = serde_json::json!({ "customer_ref": customer_ref });

			match booking::call(&self.cfg, booking::CUSTOMER_PROFILE_PATH, &payload).await {
				Ok(profile) => Ok(Some(profile)),
				Err(BookingError::NotFound(_)) => Ok(None),
				Err(err) => Err(err),
			}
		})
	}
}

pub struct Engine {
	pub cfg: Config,
	pub stores: Stores,
	pub providers: Providers,
	backend: Arc<dyn BookingBackend>,
	catalog: Catalog,
	executors: Executors,
}

impl Engine {
	pub fn new(cfg: Config, stores: Stores, backend: Arc<dyn BookingBackend>) -> Self {
		Self::with_providers(cfg, stores, backend, Providers::default())
	}

	pub fn with_providers(
		cfg: Config,
		stores: Stores,
		backend: Arc<dyn BookingBackend>,
		providers: Providers,
	) -> Self {
		let catalog = Catalog::builtin(cfg.catalog.as_ref());
		let executors = Executors::standard(backend.clone());

		Self { cfg, stores, providers, backend, catalog, executors }
	}

	pub fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	pub(crate) fn backend(&self) -> &Arc<dyn BookingBackend> {
		&self.backend
	}

	pub(crate) fn executors(&self) -> &Executors {
		&self.executors
	}
}

impl std::fmt::Display for EngineError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InputInvalid { message } => write!(f, "Invalid input: {message}"),
			Self::NotFound { message } => write!(f, "Not found: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Store { message } => write!(f, "Store error: {message}"),
		}
	}
}

impl std::error::Error for EngineError {}

impl From<caddie_store::Error> for EngineError {
	fn from(err: caddie_store::Error) -> Self {
		match err {
			caddie_store::Error::NotFound(message) => Self::NotFound { message },
			caddie_store::Error::InvalidArgument(message) => Self::InputInvalid { message },
			other => Self::Store { message: other.to_string() },
		}
	}
}

impl From<color_eyre::Report> for EngineError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

pub(crate) fn embedding_version(cfg: &Config) -> String {
	format!(
		"{}:{}:{}",
		cfg.providers.embedding.provider_id,
		cfg.providers.embedding.model,
		cfg.providers.embedding.dimensions
	)
}
