use std::sync::Arc;

use caddie_engine::{Engine, HttpBookingBackend};
use caddie_store::memory::MemoryStore;

#[derive(Clone)]
pub struct AppState {
	pub engine: Arc<Engine>,
}

impl AppState {
	/// Default wiring: HTTP providers and booking backend, with the
	/// reference in-memory store. A deployment swaps the store by
	/// constructing the engine itself and using `with_engine`.
	pub fn new(config: caddie_config::Config) -> Self {
		let backend = Arc::new(HttpBookingBackend::new(config.backend.clone()));
		let store = Arc::new(MemoryStore::new());
		let engine = Engine::new(config, store.stores(), backend);

		Self::with_engine(engine)
	}

	pub fn with_engine(engine: Engine) -> Self {
		Self { engine: Arc::new(engine) }
	}
}
