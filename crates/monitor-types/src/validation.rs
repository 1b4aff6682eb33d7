//! Configuration validation for pluggable monitor implementations.
//!
//! Every watcher and sink receives its own raw TOML table. Before building
//! anything, the implementation checks that table against a [`Schema`] of
//! required and optional [`Field`]s, so a typo in an endpoint or a missing
//! credential surfaces as a configuration error instead of a runtime failure.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// A required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// A field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// A field has the wrong TOML type.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	/// A string value.
	String,
	/// A string holding a URL whose scheme is one of the listed ones.
	Url(&'static [&'static str]),
	/// An integer value with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A nested table with its own schema.
	Table(Schema),
}

/// Custom validation hook run after the type check.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a configuration schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Attaches a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		validate_field_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of one configuration table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema with required and optional fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML table against this schema.
	///
	/// Required fields must be present. Optional fields are checked only
	/// when present. Nested tables are validated recursively and their
	/// errors are reported with a dotted path.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn type_mismatch(field: &str, expected: &str, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.to_string(),
		actual: value.type_str().to_string(),
	}
}

fn invalid(field: &str, message: String) -> ValidationError {
	ValidationError::InvalidValue {
		field: field.to_string(),
		message,
	}
}

impl ValidationError {
	/// Prefixes the offending field with its parent table name.
	fn nested_in(self, parent: &str) -> Self {
		match self {
			Self::MissingField(field) => Self::MissingField(format!("{parent}.{field}")),
			Self::InvalidValue { field, message } => Self::InvalidValue {
				field: format!("{parent}.{field}"),
				message,
			},
			Self::TypeMismatch {
				field,
				expected,
				actual,
			} => Self::TypeMismatch {
				field: format!("{parent}.{field}"),
				expected,
				actual,
			},
		}
	}
}

fn validate_field_type(
	name: &str,
	value: &toml::Value,
	expected: &FieldType,
) -> Result<(), ValidationError> {
	match expected {
		FieldType::String => {
			value
				.as_str()
				.ok_or_else(|| type_mismatch(name, "string", value))?;
		},
		FieldType::Url(schemes) => {
			let url = value
				.as_str()
				.ok_or_else(|| type_mismatch(name, "string", value))?;
			let scheme = url.split_once("://").map(|(scheme, _)| scheme);
			if !scheme.is_some_and(|scheme| schemes.contains(&scheme)) {
				return Err(invalid(
					name,
					format!("URL scheme must be one of [{}]", schemes.join(", ")),
				));
			}
		},
		FieldType::Integer { min, max } => {
			let n = value
				.as_integer()
				.ok_or_else(|| type_mismatch(name, "integer", value))?;
			if let Some(min) = min.filter(|min| n < *min) {
				return Err(invalid(name, format!("Value {n} is less than minimum {min}")));
			}
			if let Some(max) = max.filter(|max| n > *max) {
				return Err(invalid(name, format!("Value {n} is greater than maximum {max}")));
			}
		},
		FieldType::Table(schema) => {
			schema.validate(value).map_err(|e| e.nested_in(name))?;
		},
	}

	Ok(())
}

/// A configuration schema owned by one implementation.
pub trait ConfigSchema: Send + Sync {
	/// Validates the implementation's raw TOML table.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn endpoint_schema() -> Schema {
		Schema::new(
			vec![Field::new("rpc_url", FieldType::Url(&["http", "https"]))],
			vec![Field::new(
				"poll_interval_ms",
				FieldType::Integer {
					min: Some(10),
					max: Some(60_000),
				},
			)],
		)
	}

	#[test]
	fn test_accepts_valid_table() {
		let config: toml::Value = toml::from_str(
			r#"
rpc_url = "https://btc.example.com"
poll_interval_ms = 1000
"#,
		)
		.unwrap();
		assert!(endpoint_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_rejects_wrong_url_scheme() {
		let config: toml::Value = toml::from_str(r#"rpc_url = "wss://btc.example.com""#).unwrap();
		let err = endpoint_schema().validate(&config).unwrap_err();
		assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "rpc_url"));
	}

	#[test]
	fn test_reports_missing_and_out_of_range() {
		let config: toml::Value = toml::from_str("poll_interval_ms = 1000").unwrap();
		assert!(matches!(
			endpoint_schema().validate(&config),
			Err(ValidationError::MissingField(f)) if f == "rpc_url"
		));

		let config: toml::Value = toml::from_str(
			r#"
rpc_url = "http://localhost:8332"
poll_interval_ms = 1
"#,
		)
		.unwrap();
		let err = endpoint_schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("less than minimum 10"));
	}

	#[test]
	fn test_nested_table_paths() {
		let schema = Schema::new(
			vec![Field::new(
				"auth",
				FieldType::Table(Schema::new(vec![Field::new("user", FieldType::String)], vec![])),
			)],
			vec![],
		);
		let config: toml::Value = toml::from_str("[auth]\nuser = 5").unwrap();
		let err = schema.validate(&config).unwrap_err();
		assert!(err.to_string().contains("auth.user"));
	}
}
