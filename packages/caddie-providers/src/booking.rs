use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;

pub const AVAILABILITY_PATH: &str = "/v1/availability/check";
pub const CREATE_BOOKING_PATH: &str = "/v1/bookings";
pub const CANCEL_BOOKING_PATH: &str = "/v1/bookings/cancel";
pub const LOOKUP_BOOKING_PATH: &str = "/v1/bookings/lookup";
pub const SPECIALIST_AVAILABILITY_PATH: &str = "/v1/specialists/availability";
pub const CUSTOMER_PROFILE_PATH: &str = "/v1/customers/profile";

/// Failure surface of the booking backend, already shaped for the
/// executor failure taxonomy. State-changing calls are never retried
/// here; a duplicate booking is worse than a failed one.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
	#[error("Not found: {0}")]
	NotFound(String),
	#[error("Conflict: {0}")]
	Conflict(String),
	#[error("Upstream failure: {0}")]
	Upstream(String),
}

pub async fn call(
	cfg: &caddie_config::Backend,
	path: &str,
	payload: &Value,
) -> Result<Value, BookingError> {
	let client = Client::builder()
		.timeout(Duration::from_millis(cfg.timeout_ms))
		.build()
		.map_err(|err| BookingError::Upstream(err.to_string()))?;
	let url = format!("{}{}", cfg.api_base, path);
	let headers = crate::auth_headers(&cfg.api_key, &cfg.default_headers)
		.map_err(|err| BookingError::Upstream(err.to_string()))?;
	let res = client
		.post(url)
		.headers(headers)
		.json(payload)
		.send()
		.await
		.map_err(|err| BookingError::Upstream(err.to_string()))?;
	let status = res.status();
	let body: Value = res.json().await.unwrap_or(Value::Null);

	if status.is_success() {
		Ok(body)
	} else if status == StatusCode::NOT_FOUND {
		Err(BookingError::NotFound(detail_of(&body)))
	} else if status == StatusCode::CONFLICT {
		Err(BookingError::Conflict(detail_of(&body)))
	} else {
		Err(BookingError::Upstream(format!("{status}: {}", detail_of(&body))))
	}
}

fn detail_of(body: &Value) -> String {
	body.get("detail")
		.or_else(|| body.get("message"))
		.and_then(|v| v.as_str())
		.unwrap_or("no detail")
		.to_string()
}
