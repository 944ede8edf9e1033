//! Schema checks for backend configuration tables.
//!
//! Storage backends receive their settings as raw TOML. Each backend
//! describes the keys it understands with a [`Schema`] so that a malformed
//! section is reported by field name before the backend is constructed.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	#[error("Missing required field: {0}")]
	MissingField(String),
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: &'static str,
		actual: &'static str,
	},
}

/// Expected shape of a configuration value.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
	String,
	/// Integer with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
}

impl FieldType {
	fn check(&self, field: &str, value: &toml::Value) -> Result<(), ValidationError> {
		let mismatch = |expected| ValidationError::TypeMismatch {
			field: field.to_string(),
			expected,
			actual: value.type_str(),
		};

		match *self {
			FieldType::String => value.as_str().map(|_| ()).ok_or_else(|| mismatch("string")),
			FieldType::Integer { min, max } => {
				let n = value.as_integer().ok_or_else(|| mismatch("integer"))?;
				let out_of_range = |message: String| ValidationError::InvalidValue {
					field: field.to_string(),
					message,
				};
				if let Some(min) = min.filter(|min| n < *min) {
					return Err(out_of_range(format!("{} is below the minimum of {}", n, min)));
				}
				if let Some(max) = max.filter(|max| n > *max) {
					return Err(out_of_range(format!("{} is above the maximum of {}", n, max)));
				}
				Ok(())
			},
		}
	}
}

/// Extra check run once the type matches; returns a message on failure.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

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
			.field("has_validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		self.field_type.check(&self.name, value)?;
		match &self.validator {
			Some(validator) => validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			}),
			None => Ok(()),
		}
	}
}

/// Required fields must be present; optional ones are checked when present.
/// Keys the schema does not mention are ignored.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config.as_table().ok_or(ValidationError::TypeMismatch {
			field: "root".to_string(),
			expected: "table",
			actual: config.type_str(),
		})?;

		for field in &self.required {
			match table.get(&field.name) {
				Some(value) => field.check(value)?,
				None => return Err(ValidationError::MissingField(field.name.clone())),
			}
		}
		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}
		Ok(())
	}
}

/// Implemented by every backend so its section can be checked up front.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(s: &str) -> toml::Value {
		toml::from_str(s).unwrap()
	}

	fn ttl_schema() -> Schema {
		Schema::new(
			vec![],
			vec![Field::new(
				"ttl_carts",
				FieldType::Integer {
					min: Some(0),
					max: Some(86_400 * 30),
				},
			)],
		)
	}

	#[test]
	fn test_required_field_missing() {
		let schema = Schema::new(vec![Field::new("storage_path", FieldType::String)], vec![]);
		let err = schema.validate(&parse("other = 1")).unwrap_err();
		assert!(matches!(err, ValidationError::MissingField(f) if f == "storage_path"));
	}

	#[test]
	fn test_integer_bounds() {
		let schema = ttl_schema();
		assert!(schema.validate(&parse("ttl_carts = 60")).is_ok());
		assert!(schema.validate(&parse("unrelated = true")).is_ok());
		assert!(matches!(
			schema.validate(&parse("ttl_carts = -1")),
			Err(ValidationError::InvalidValue { .. })
		));
		let err = schema.validate(&parse("ttl_carts = 99999999")).unwrap_err();
		assert!(err.to_string().contains("above the maximum"));
	}

	#[test]
	fn test_type_mismatch_names_both_types() {
		let err = ttl_schema()
			.validate(&parse("ttl_carts = \"1h\""))
			.unwrap_err();
		assert_eq!(
			err.to_string(),
			"Type mismatch for field 'ttl_carts': expected integer, got string"
		);
	}

	#[test]
	fn test_custom_validator_runs_after_type_check() {
		let schema = Schema::new(
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|v| match v.as_str() {
					Some("") => Err("must not be empty".into()),
					_ => Ok(()),
				}),
			],
			vec![],
		);
		let err = schema.validate(&parse("storage_path = \"\"")).unwrap_err();
		assert!(err.to_string().contains("must not be empty"));
		assert!(matches!(
			schema.validate(&parse("storage_path = 3")),
			Err(ValidationError::TypeMismatch { .. })
		));
	}

	#[test]
	fn test_root_must_be_table() {
		let schema = Schema::new(vec![], vec![]);
		assert!(schema.validate(&toml::Value::Boolean(true)).is_err());
	}
}
