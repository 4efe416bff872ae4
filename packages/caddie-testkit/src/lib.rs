use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use color_eyre::eyre;
use serde_json::{Value, json};

use caddie_config::{ChatProviderConfig, EmbeddingProviderConfig};
use caddie_engine::{BookingBackend, ChatProvider, EmbeddingProvider};
use caddie_providers::{booking::BookingError, chat::ChatOutcome};
use caddie_store::BoxFuture;

/// Deterministic embedder: a bag-of-tokens hashed into the configured
/// dimension count and L2-normalized. Texts sharing tokens land close in
/// cosine space, which is all the engine tests need.
pub struct FakeEmbedder;

impl EmbeddingProvider for FakeEmbedder {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		let dim = cfg.dimensions as usize;
		let vectors = texts.iter().map(|text| token_vector(text, dim)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

fn token_vector(text: &str, dim: usize) -> Vec<f32> {
	let mut vector = vec![0.0f32; dim.max(1)];

	for token in text.to_lowercase().split(|ch: char| !ch.is_alphanumeric()) {
		if token.is_empty() {
			continue;
		}

		let index = (fnv1a(token.as_bytes()) % vector.len() as u64) as usize;

		vector[index] += 1.0;
	}

	let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm > 0.0 {
		for value in &mut vector {
			*value /= norm;
		}
	}

	vector
}

fn fnv1a(bytes: &[u8]) -> u64 {
	let mut hash = 0xcbf2_9ce4_8422_2325u64;

	for byte in bytes {
		hash ^= u64::from(*byte);
		hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
	}

	hash
}

/// One scripted model turn.
#[derive(Clone, Debug)]
pub enum ScriptedTurn {
	Outcome(ChatOutcome),
	/// Simulates an exhausted-retries provider failure.
	Unavailable,
}

/// Chat model that replays a script, then repeats a fixed outcome (when
/// configured) or a bland acknowledgment. Counts calls so tests can
/// assert the chain bound.
pub struct ScriptedChat {
	script: Mutex<VecDeque<ScriptedTurn>>,
	repeat: Option<ChatOutcome>,
	calls: AtomicUsize,
}

impl ScriptedChat {
	pub fn new(turns: Vec<ScriptedTurn>) -> Self {
		Self { script: Mutex::new(turns.into()), repeat: None, calls: AtomicUsize::new(0) }
	}

	pub fn replying(text: &str) -> Self {
		Self::new(vec![ScriptedTurn::Outcome(ChatOutcome::Reply(text.to_string()))])
	}

	/// An adversarial model that answers every round the same way.
	pub fn repeating(outcome: ChatOutcome) -> Self {
		Self { script: Mutex::new(VecDeque::new()), repeat: Some(outcome), calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a ChatProviderConfig,
		_messages: &'a [Value],
		_tools: Option<&'a Value>,
	) -> BoxFuture<'a, color_eyre::Result<ChatOutcome>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let next = self.script.lock().unwrap_or_else(|err| err.into_inner()).pop_front();

		Box::pin(async move {
			match next {
				Some(ScriptedTurn::Outcome(outcome)) => Ok(outcome),
				Some(ScriptedTurn::Unavailable) => Err(eyre::eyre!("Scripted model outage.")),
				None => match &self.repeat {
					Some(outcome) => Ok(outcome.clone()),
					None => Ok(ChatOutcome::Reply(
						"Noted. A teammate will follow up shortly.".to_string(),
					)),
				},
			}
		})
	}
}

#[derive(Clone, Debug)]
pub struct Slot {
	pub date: String,
	pub start: String,
	pub end: String,
	pub bay_type: Option<String>,
	pub specialist: Option<String>,
}

/// In-process stand-in for the booking service. Counts state-changing
/// commits so dry-run tests can assert that nothing was written.
#[derive(Default)]
pub struct InMemoryBookingApi {
	slots: Mutex<Vec<Slot>>,
	bookings: Mutex<Vec<Value>>,
	profiles: Mutex<HashMap<String, Value>>,
	commits: AtomicUsize,
	fail_upstream: AtomicBool,
	next_ref: AtomicUsize,
}

impl InMemoryBookingApi {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_slot(&self, slot: Slot) {
		self.slots.lock().unwrap_or_else(|err| err.into_inner()).push(slot);
	}

	pub fn add_booking(&self, booking_ref: &str, customer_ref: &str) {
		self.bookings.lock().unwrap_or_else(|err| err.into_inner()).push(json!({
			"booking_ref": booking_ref,
			"customer_ref": customer_ref,
			"status": "confirmed",
		}));
	}

	pub fn add_profile(&self, customer_ref: &str, profile: Value) {
		self.profiles
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.insert(customer_ref.to_string(), profile);
	}

	pub fn set_fail_upstream(&self, fail: bool) {
		self.fail_upstream.store(fail, Ordering::SeqCst);
	}

	/// Number of state-changing operations that actually committed.
	pub fn commit_count(&self) -> usize {
		self.commits.load(Ordering::SeqCst)
	}

	pub fn slot_count(&self) -> usize {
		self.slots.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	fn check_fail(&self) -> Result<(), BookingError> {
		if self.fail_upstream.load(Ordering::SeqCst) {
			return Err(BookingError::Upstream("Injected backend outage.".to_string()));
		}

		Ok(())
	}
}

fn field<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
	params.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn slot_matches(slot: &Slot, params: &Value) -> bool {
	if let Some(date) = field(params, "date")
		&& date != slot.date
	{
		return false;
	}
	if let Some(start) = field(params, "start")
		&& start != slot.start
	{
		return false;
	}
	if let Some(end) = field(params, "end")
		&& end != slot.end
	{
		return false;
	}
	if let Some(bay_type) = field(params, "bay_type")
		&& Some(bay_type) != slot.bay_type.as_deref()
	{
		return false;
	}

	true
}

fn slot_json(slot: &Slot) -> Value {
	json!({
		"date": slot.date,
		"start": slot.start,
		"end": slot.end,
		"bay_type": slot.bay_type,
		"specialist": slot.specialist,
	})
}

impl BookingBackend for InMemoryBookingApi {
	fn check_availability<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(async move {
			self.check_fail()?;

			let slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
			let matching: Vec<Value> =
				slots.iter().filter(|slot| slot_matches(slot, params)).map(slot_json).collect();

			Ok(json!({ "slots": matching }))
		})
	}

	fn create_booking<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(async move {
			self.check_fail()?;

			let mut slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
			let Some(index) = slots.iter().position(|slot| slot_matches(slot, params)) else {
				return Err(BookingError::Conflict("Requested slot is not available.".to_string()));
			};
			let slot = slots.remove(index);
			let ordinal = self.next_ref.fetch_add(1, Ordering::SeqCst) + 1;
			let booking_ref = format!("bk-{ordinal}");
			let booking = json!({
				"booking_ref": booking_ref,
				"customer_ref": params.get("customer_ref").cloned().unwrap_or(Value::Null),
				"customer_name": params.get("customer_name").cloned().unwrap_or(Value::Null),
				"date": slot.date,
				"start": slot.start,
				"end": slot.end,
				"status": "confirmed",
			});

			self.bookings.lock().unwrap_or_else(|err| err.into_inner()).push(booking.clone());
			self.commits.fetch_add(1, Ordering::SeqCst);

			Ok(booking)
		})
	}

	fn cancel_booking<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(async move {
			self.check_fail()?;

			let Some(booking_ref) = field(params, "booking_ref") else {
				return Err(BookingError::NotFound("No booking reference given.".to_string()));
			};
			let mut bookings = self.bookings.lock().unwrap_or_else(|err| err.into_inner());
			let Some(index) = bookings
				.iter()
				.position(|booking| booking.get("booking_ref").and_then(|v| v.as_str()) == Some(booking_ref))
			else {
				return Err(BookingError::NotFound(format!("Booking {booking_ref} not found.")));
			};

			bookings.remove(index);
			self.commits.fetch_add(1, Ordering::SeqCst);

			Ok(json!({ "cancelled": true, "booking_ref": booking_ref }))
		})
	}

	fn lookup_booking<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(async move {
			self.check_fail()?;

			let bookings = self.bookings.lock().unwrap_or_else(|err| err.into_inner());

			if let Some(booking_ref) = field(params, "booking_ref") {
				let Some(booking) = bookings
					.iter()
					.find(|booking| booking.get("booking_ref").and_then(|v| v.as_str()) == Some(booking_ref))
				else {
					return Err(BookingError::NotFound(format!(
						"Booking {booking_ref} not found."
					)));
				};

				return Ok(json!({ "bookings": [booking] }));
			}

			let customer_ref = field(params, "customer_ref").unwrap_or_default();
			let matching: Vec<&Value> = bookings
				.iter()
				.filter(|booking| {
					booking.get("customer_ref").and_then(|v| v.as_str()) == Some(customer_ref)
				})
				.collect();

			Ok(json!({ "bookings": matching }))
		})
	}

	fn specialist_availability<'a>(
		&'a self,
		params: &'a Value,
	) -> BoxFuture<'a, Result<Value, BookingError>> {
		Box::pin(async move {
			self.check_fail()?;

			let specialist = field(params, "specialist").unwrap_or_default();
			let slots = self.slots.lock().unwrap_or_else(|err| err.into_inner());
			let matching: Vec<Value> = slots
				.iter()
				.filter(|slot| slot.specialist.as_deref() == Some(specialist))
				.filter(|slot| slot_matches(slot, params))
				.map(slot_json)
				.collect();

			Ok(json!({ "specialist": specialist, "slots": matching }))
		})
	}

	fn customer_profile<'a>(
		&'a self,
		customer_ref: &'a str,
	) -> BoxFuture<'a, Result<Option<Value>, BookingError>> {
		Box::pin(async move {
			self.check_fail()?;

			let profiles = self.profiles.lock().unwrap_or_else(|err| err.into_inner());

			Ok(profiles.get(customer_ref).cloned())
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn token_vectors_are_deterministic_and_similar_for_shared_tokens() {
		let a = token_vector("What is a social bay?", 64);
		let b = token_vector("What is social bay?", 64);
		let c = token_vector("Opening hours on Monday", 64);

		assert_eq!(a, token_vector("What is a social bay?", 64));

		let sim_ab = caddie_store::similarity::cosine(&a, &b);
		let sim_ac = caddie_store::similarity::cosine(&a, &c);

		assert!(sim_ab > 0.8, "Expected near match, got {sim_ab}");
		assert!(sim_ac < 0.6, "Expected far match, got {sim_ac}");
		assert!(sim_ac < sim_ab);
	}

	#[tokio::test]
	async fn specialist_slots_filter_by_date() {
		let backend = InMemoryBookingApi::new();

		backend.add_slot(Slot {
			date: "2026-08-07".to_string(),
			start: "10:00".to_string(),
			end: "11:00".to_string(),
			bay_type: None,
			specialist: Some("Arthit".to_string()),
		});

		let params = json!({ "specialist": "Arthit", "date": "2026-08-08" });
		let result = backend
			.specialist_availability(&params)
			.await
			.expect("Specialist lookup must succeed.");

		assert_eq!(result["slots"].as_array().map(Vec::len), Some(0));
	}

	#[tokio::test]
	async fn dry_run_probe_does_not_touch_commit_count() {
		let backend = InMemoryBookingApi::new();

		backend.add_slot(Slot {
			date: "2026-08-07".to_string(),
			start: "19:00".to_string(),
			end: "20:00".to_string(),
			bay_type: None,
			specialist: None,
		});

		let params = json!({ "start": "19:00", "end": "20:00" });
		let _ = backend.check_availability(&params).await.expect("Availability must succeed.");

		assert_eq!(backend.commit_count(), 0);
		assert_eq!(backend.slot_count(), 1);
	}
}
