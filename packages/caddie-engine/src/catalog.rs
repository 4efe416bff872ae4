use serde_json::{Map, Value, json};

use caddie_config::CatalogTuning;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
	String,
	Integer,
}

impl ParamKind {
	fn json_type(self) -> &'static str {
		match self {
			Self::String => "string",
			Self::Integer => "integer",
		}
	}

	fn matches(self, value: &Value) -> bool {
		match self {
			Self::String => value.is_string(),
			Self::Integer => value.is_i64() || value.is_u64(),
		}
	}
}

#[derive(Clone, Debug)]
pub struct ParamSpec {
	pub name: &'static str,
	pub kind: ParamKind,
	pub required: bool,
	pub description: &'static str,
}

/// One callable action. Trigger hints are advisory prose handed to the
/// model inside the description; nothing in the engine matches on them.
#[derive(Clone, Debug)]
pub struct FunctionSpec {
	pub name: &'static str,
	pub description: &'static str,
	pub parameters: Vec<ParamSpec>,
	pub trigger_hints: Vec<String>,
}

pub struct Catalog {
	specs: Vec<FunctionSpec>,
}

fn required_str(name: &'static str, description: &'static str) -> ParamSpec {
	ParamSpec { name, kind: ParamKind::String, required: true, description }
}

fn optional_str(name: &'static str, description: &'static str) -> ParamSpec {
	ParamSpec { name, kind: ParamKind::String, required: false, description }
}

impl Catalog {
	/// The five built-in actions, with configured extra trigger hints
	/// merged in. Adding an action is one entry here plus one executor
	/// registration.
	pub fn builtin(tuning: Option<&CatalogTuning>) -> Self {
		let mut specs = vec![
			FunctionSpec {
				name: "create_booking",
				description: "Create a bay booking for the customer.",
				parameters: vec![
					required_str("start", "Start time, 24h HH:MM."),
					required_str("end", "End time, 24h HH:MM."),
					optional_str("date", "Date, YYYY-MM-DD. Omit for today."),
					optional_str("bay_type", "Requested bay type, e.g. social or standard."),
					optional_str("customer_name", "Name to put on the booking."),
					ParamSpec {
						name: "party_size",
						kind: ParamKind::Integer,
						required: false,
						description: "Number of guests.",
					},
					optional_str("notes", "Free-form notes for staff."),
				],
				trigger_hints: vec![
					"the customer confirms a previously offered time".to_string(),
					"a bare time range right after an availability offer".to_string(),
					"จอง (book)".to_string(),
				],
			},
			FunctionSpec {
				name: "check_availability",
				description: "Check which bays and times are free.",
				parameters: vec![
					required_str("date", "Date, YYYY-MM-DD."),
					optional_str("start", "Earliest start time, 24h HH:MM."),
					optional_str("end", "Latest end time, 24h HH:MM."),
					optional_str("bay_type", "Bay type to filter on."),
				],
				trigger_hints: vec![
					"the customer asks whether a time or bay is free".to_string(),
					"ว่างไหม (is it free?)".to_string(),
				],
			},
			FunctionSpec {
				name: "cancel_booking",
				description: "Cancel an existing booking.",
				parameters: vec![
					required_str("booking_ref", "The booking reference to cancel."),
					optional_str("reason", "Customer-stated reason."),
				],
				trigger_hints: vec![
					"the customer asks to cancel".to_string(),
					"ยกเลิก (cancel)".to_string(),
				],
			},
			FunctionSpec {
				name: "lookup_booking",
				description: "Look up the customer's existing bookings.",
				parameters: vec![
					optional_str("booking_ref", "A specific booking reference."),
					optional_str("customer_ref", "The customer's reference on the channel."),
				],
				trigger_hints: vec![
					"the customer asks about an existing booking".to_string(),
					"the customer wants to cancel but gave no reference".to_string(),
					"เช็คการจอง (check booking)".to_string(),
				],
			},
			FunctionSpec {
				name: "check_specialist_availability",
				description: "Check when a named instructor or pro is available.",
				parameters: vec![
					required_str("specialist", "Instructor or pro name."),
					required_str("date", "Date, YYYY-MM-DD."),
					optional_str("start", "Earliest start time, 24h HH:MM."),
					optional_str("end", "Latest end time, 24h HH:MM."),
				],
				trigger_hints: vec![
					"the customer asks for a lesson or a specific instructor".to_string(),
					"โปรว่างไหม (is the pro free?)".to_string(),
				],
			},
		];

		if let Some(tuning) = tuning {
			for spec in &mut specs {
				if let Some(extra) = tuning.extra_trigger_hints.get(spec.name) {
					spec.trigger_hints.extend(extra.iter().cloned());
				}
			}
		}

		Self { specs }
	}

	pub fn specs(&self) -> &[FunctionSpec] {
		&self.specs
	}

	pub fn names(&self) -> Vec<&'static str> {
		self.specs.iter().map(|spec| spec.name).collect()
	}

	/// The OpenAI-style `tools` array handed to the chat model.
	pub fn tools_json(&self) -> Value {
		let tools: Vec<Value> = self
			.specs
			.iter()
			.map(|spec| {
				let mut properties = Map::new();
				let mut required = Vec::new();

				for param in &spec.parameters {
					properties.insert(
						param.name.to_string(),
						json!({ "type": param.kind.json_type(), "description": param.description }),
					);

					if param.required {
						required.push(Value::String(param.name.to_string()));
					}
				}

				json!({
					"type": "function",
					"function": {
						"name": spec.name,
						"description": format!(
							"{} Consider when: {}.",
							spec.description,
							spec.trigger_hints.join("; ")
						),
						"parameters": {
							"type": "object",
							"properties": properties,
							"required": required,
						},
					},
				})
			})
			.collect();

		Value::Array(tools)
	}

	/// Schema check for a model-chosen call. A failure here means the
	/// executor is never invoked; the orchestrator falls back to a plain
	/// reply instead of repairing the call.
	pub fn validate_call(&self, name: &str, args: &Value) -> Result<(), String> {
		let Some(spec) = self.specs.iter().find(|spec| spec.name == name) else {
			return Err(format!("Unknown function {name:?}."));
		};
		let Some(object) = args.as_object() else {
			return Err(format!("Arguments for {name:?} must be a JSON object."));
		};

		for param in &spec.parameters {
			match object.get(param.name) {
				None | Some(Value::Null) =>
					if param.required {
						return Err(format!(
							"Missing required parameter {:?} for {name:?}.",
							param.name
						));
					},
				Some(value) =>
					if !param.kind.matches(value) {
						return Err(format!(
							"Parameter {:?} for {name:?} must be a {}.",
							param.name,
							param.kind.json_type()
						));
					},
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn registers_the_five_actions() {
		let catalog = Catalog::builtin(None);

		assert_eq!(catalog.names(), vec![
			"create_booking",
			"check_availability",
			"cancel_booking",
			"lookup_booking",
			"check_specialist_availability",
		]);
	}

	#[test]
	fn merges_configured_trigger_hints() {
		let mut tuning = CatalogTuning::default();

		tuning
			.extra_trigger_hints
			.insert("create_booking".to_string(), vec!["walk-in follow-up".to_string()]);

		let catalog = Catalog::builtin(Some(&tuning));
		let spec = catalog
			.specs()
			.iter()
			.find(|spec| spec.name == "create_booking")
			.expect("create_booking must exist.");

		assert!(spec.trigger_hints.iter().any(|hint| hint == "walk-in follow-up"));
	}

	#[test]
	fn validate_call_rejects_unknown_function() {
		let catalog = Catalog::builtin(None);

		assert!(catalog.validate_call("send_invoice", &json!({})).is_err());
	}

	#[test]
	fn validate_call_rejects_missing_required_parameter() {
		let catalog = Catalog::builtin(None);
		let error = catalog
			.validate_call("create_booking", &json!({ "start": "19:00" }))
			.expect_err("Missing end must be rejected.");

		assert!(error.contains("end"), "Unexpected error: {error}");
	}

	#[test]
	fn validate_call_rejects_wrong_type() {
		let catalog = Catalog::builtin(None);
		let args = json!({ "start": "19:00", "end": "20:00", "party_size": "four" });

		assert!(catalog.validate_call("create_booking", &args).is_err());
	}

	#[test]
	fn validate_call_accepts_optional_null() {
		let catalog = Catalog::builtin(None);
		let args = json!({ "start": "19:00", "end": "20:00", "date": null });

		assert!(catalog.validate_call("create_booking", &args).is_ok());
	}

	#[test]
	fn tools_json_carries_hints_in_description() {
		let catalog = Catalog::builtin(None);
		let tools = catalog.tools_json();
		let description = tools[0]["function"]["description"].as_str().expect("description");

		assert!(description.contains("Consider when:"));
	}
}
