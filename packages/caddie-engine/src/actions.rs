use std::{
	collections::HashMap,
	sync::{Arc, OnceLock},
};

use regex::Regex;
use serde_json::{Value, json};

use caddie_providers::booking::BookingError;
use caddie_store::BoxFuture;

/// Typed failure surface of an executor. Each kind maps to distinct
/// fallback phrasing in the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
	Validation,
	NotFound,
	Conflict,
	UpstreamError,
}

impl FailureKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "VALIDATION",
			Self::NotFound => "NOT_FOUND",
			Self::Conflict => "CONFLICT",
			Self::UpstreamError => "UPSTREAM_ERROR",
		}
	}
}

#[derive(Clone, Debug)]
pub struct ExecutionFailure {
	pub kind: FailureKind,
	pub detail: String,
}

pub type ExecutionResult = Result<Value, ExecutionFailure>;

/// Discriminated wire shape recorded on the suggestion and appended to
/// the model exchange.
pub fn outcome_json(result: &ExecutionResult) -> Value {
	match result {
		Ok(data) => json!({ "ok": true, "data": data }),
		Err(failure) => json!({
			"ok": false,
			"error_kind": failure.kind.as_str(),
			"detail": failure.detail,
		}),
	}
}

/// The external booking/inventory service, as the executors see it.
/// Implementations must keep every method free of retries on the
/// state-changing paths; a duplicate booking is worse than a failed one.
pub trait BookingBackend
where
	Self: Send + Sync,
{
	fn check_availability<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>>;
	fn create_booking<'a>(&'a self, params: &'a Value)
	-> BoxFuture<'a, Result<Value, BookingError>>;
	fn cancel_booking<'a>(&'a self, params: &'a Value)
	-> BoxFuture<'a, Result<Value, BookingError>>;
	fn lookup_booking<'a>(&'a self, params: &'a Value)
	-> BoxFuture<'a, Result<Value, BookingError>>;
	fn specialist_availability<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>>;
	fn customer_profile<'a>(
		&'a self,
		customer_ref: &'a str,
	) -> BoxFuture<'a, Result<Option<Value>, BookingError>>;
}

pub trait ActionExecutor
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;
	/// Under dry-run the executor may only validate and read; it must
	/// never commit a state-changing backend operation.
	fn execute<'a>(&'a self, args: &'a Value, dry_run: bool) -> BoxFuture<'a, ExecutionResult>;
}

/// Name-to-executor map. Adding an action is one registration here, not
/// a new conditional somewhere in the orchestrator.
pub struct Executors {
	map: HashMap<&'static str, Arc<dyn ActionExecutor>>,
}

impl Executors {
	pub fn standard(backend: Arc<dyn BookingBackend>) -> Self {
		let executors: Vec<Arc<dyn ActionExecutor>> = vec![
			Arc::new(CreateBooking { backend: backend.clone() }),
			Arc::new(CheckAvailability { backend: backend.clone() }),
			Arc::new(CancelBooking { backend: backend.clone() }),
			Arc::new(LookupBooking { backend: backend.clone() }),
			Arc::new(SpecialistAvailability { backend }),
		];
		let mut map = HashMap::new();

		for executor in executors {
			map.insert(executor.name(), executor);
		}

		Self { map }
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn ActionExecutor>> {
		self.map.get(name).cloned()
	}
}

struct CreateBooking {
	backend: Arc<dyn BookingBackend>,
}

struct CheckAvailability {
	backend: Arc<dyn BookingBackend>,
}

struct CancelBooking {
	backend: Arc<dyn BookingBackend>,
}

struct LookupBooking {
	backend: Arc<dyn BookingBackend>,
}

struct SpecialistAvailability {
	backend: Arc<dyn BookingBackend>,
}

impl ActionExecutor for CreateBooking {
	fn name(&self) -> &'static str {
		"create_booking"
	}

	fn execute<'a>(&'a self, args: &'a Value, dry_run: bool) -> BoxFuture<'a, ExecutionResult> {
		Box::pin(async move {
			let start = require_time(args, "start")?;
			let end = require_time(args, "end")?;

			// HH:MM compares correctly as text.
			if end <= start {
				return Err(validation("end must be after start."));
			}
			if let Some(date) = optional_str(args, "date") {
				check_date(date)?;
			}
			if let Some(size) = args.get("party_size").and_then(|v| v.as_i64())
				&& size < 1
			{
				return Err(validation("party_size must be at least 1."));
			}

			if dry_run {
				// Validation and availability only; the booking is never
				// committed on this path.
				let probe = json!({
					"date": args.get("date").cloned().unwrap_or(Value::Null),
					"start": start,
					"end": end,
					"bay_type": args.get("bay_type").cloned().unwrap_or(Value::Null),
				});
				let available =
					self.backend.check_availability(&probe).await.map_err(from_backend)?;

				return Ok(json!({ "dry_run": true, "would_create": args, "availability": available }));
			}

			self.backend.create_booking(args).await.map_err(from_backend)
		})
	}
}

impl ActionExecutor for CheckAvailability {
	fn name(&self) -> &'static str {
		"check_availability"
	}

	fn execute<'a>(&'a self, args: &'a Value, _dry_run: bool) -> BoxFuture<'a, ExecutionResult> {
		Box::pin(async move {
			check_date(require_str(args, "date")?)?;

			for key in ["start", "end"] {
				if let Some(value) = optional_str(args, key) {
					check_time(key, value)?;
				}
			}

			self.backend.check_availability(args).await.map_err(from_backend)
		})
	}
}

impl ActionExecutor for CancelBooking {
	fn name(&self) -> &'static str {
		"cancel_booking"
	}

	fn execute<'a>(&'a self, args: &'a Value, dry_run: bool) -> BoxFuture<'a, ExecutionResult> {
		Box::pin(async move {
			let booking_ref = require_str(args, "booking_ref")?;

			if dry_run {
				let probe = json!({ "booking_ref": booking_ref });
				let found = self.backend.lookup_booking(&probe).await.map_err(from_backend)?;

				return Ok(json!({ "dry_run": true, "would_cancel": booking_ref, "booking": found }));
			}

			self.backend.cancel_booking(args).await.map_err(from_backend)
		})
	}
}

impl ActionExecutor for LookupBooking {
	fn name(&self) -> &'static str {
		"lookup_booking"
	}

	fn execute<'a>(&'a self, args: &'a Value, _dry_run: bool) -> BoxFuture<'a, ExecutionResult> {
		Box::pin(async move {
			if optional_str(args, "booking_ref").is_none()
				&& optional_str(args, "customer_ref").is_none()
			{
				return Err(validation("Provide booking_ref or customer_ref."));
			}

			self.backend.lookup_booking(args).await.map_err(from_backend)
		})
	}
}

impl ActionExecutor for SpecialistAvailability {
	fn name(&self) -> &'static str {
		"check_specialist_availability"
	}

	fn execute<'a>(&'a self, args: &'a Value, _dry_run: bool) -> BoxFuture<'a, ExecutionResult> {
		Box::pin(async move {
			require_str(args, "specialist")?;
			check_date(require_str(args, "date")?)?;

			for key in ["start", "end"] {
				if let Some(value) = optional_str(args, key) {
					check_time(key, value)?;
				}
			}

			self.backend.specialist_availability(args).await.map_err(from_backend)
		})
	}
}

fn validation(detail: impl Into<String>) -> ExecutionFailure {
	ExecutionFailure { kind: FailureKind::Validation, detail: detail.into() }
}

fn from_backend(err: BookingError) -> ExecutionFailure {
	let kind = match &err {
		BookingError::NotFound(_) => FailureKind::NotFound,
		BookingError::Conflict(_) => FailureKind::Conflict,
		BookingError::Upstream(_) => FailureKind::UpstreamError,
	};

	ExecutionFailure { kind, detail: err.to_string() }
}

fn optional_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
	args.get(key).and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty())
}

fn require_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ExecutionFailure> {
	optional_str(args, key).ok_or_else(|| validation(format!("{key} is required.")))
}

fn require_time<'a>(args: &'a Value, key: &str) -> Result<&'a str, ExecutionFailure> {
	let value = require_str(args, key)?;

	check_time(key, value)?;

	Ok(value)
}

fn check_time(key: &str, value: &str) -> Result<(), ExecutionFailure> {
	static TIME: OnceLock<Option<Regex>> = OnceLock::new();

	let matched = TIME
		.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").ok())
		.as_ref()
		.map(|re| re.is_match(value))
		.unwrap_or(false);

	if matched { Ok(()) } else { Err(validation(format!("{key} must be a 24h HH:MM time."))) }
}

fn check_date(value: &str) -> Result<(), ExecutionFailure> {
	static DATE: OnceLock<Option<Regex>> = OnceLock::new();

	let matched = DATE
		.get_or_init(|| Regex::new(r"^\d{4}-(0\d|1[0-2])-([0-2]\d|3[01])$").ok())
		.as_ref()
		.map(|re| re.is_match(value))
		.unwrap_or(false);

	if matched { Ok(()) } else { Err(validation("date must be YYYY-MM-DD.")) }
}
