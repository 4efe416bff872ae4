mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Backend, CatalogTuning, ChatProviderConfig, Config, EmbeddingProviderConfig, Orchestrator,
	Providers, Retrieval, Service,
};

use std::{fs, path::Path};

/// Function names the engine registers; `[catalog]` tuning may only
/// reference these.
pub const ACTION_NAMES: [&str; 5] = [
	"create_booking",
	"check_availability",
	"cancel_booking",
	"lookup_booking",
	"check_specialist_availability",
];

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if !cfg.retrieval.min_score.is_finite() || !(0.0..=1.0).contains(&cfg.retrieval.min_score) {
		return Err(Error::Validation {
			message: "retrieval.min_score must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.history_window == 0 {
		return Err(Error::Validation {
			message: "retrieval.history_window must be greater than zero.".to_string(),
		});
	}
	if !(1..=8).contains(&cfg.orchestrator.max_rounds) {
		return Err(Error::Validation {
			message: "orchestrator.max_rounds must be between 1 and 8.".to_string(),
		});
	}
	if cfg.orchestrator.request_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "orchestrator.request_timeout_ms must be greater than zero.".to_string(),
		});
	}

	for (label, temperature) in [
		("providers.chat", cfg.providers.chat.temperature),
		("providers.judge", cfg.providers.judge.temperature),
	] {
		if !temperature.is_finite() || temperature < 0.0 {
			return Err(Error::Validation {
				message: format!("{label}.temperature must be zero or greater."),
			});
		}
	}

	for (label, key) in [
		("providers.embedding", &cfg.providers.embedding.api_key),
		("providers.chat", &cfg.providers.chat.api_key),
		("providers.judge", &cfg.providers.judge.api_key),
		("backend", &cfg.backend.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("{label}.api_key must be non-empty."),
			});
		}
	}

	if let Some(catalog) = cfg.catalog.as_ref() {
		for name in catalog.extra_trigger_hints.keys() {
			if !ACTION_NAMES.contains(&name.as_str()) {
				return Err(Error::Validation {
					message: format!(
						"catalog.extra_trigger_hints references unknown function {name:?}."
					),
				});
			}
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if let Some(catalog) = cfg.catalog.as_mut() {
		for hints in catalog.extra_trigger_hints.values_mut() {
			hints.retain(|hint| !hint.trim().is_empty());
		}

		catalog.extra_trigger_hints.retain(|_, hints| !hints.is_empty());
	}
}
