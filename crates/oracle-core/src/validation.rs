use std::fmt;

pub type ValidationResult = Result<(), ValidationError>;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub kind: ValidationKind,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, kind: ValidationKind) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(&field, format!("field '{}' is required", field), ValidationKind::Required)
    }

    pub fn out_of_range(field: impl Into<String>, min: f64, max: f64, actual: f64) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("field '{}' must be in [{}, {}] (got {})", field, min, max, actual),
            ValidationKind::OutOfRange { min, max, actual },
        )
    }

    pub fn min_value(field: impl Into<String>, min: f64, actual: f64) -> Self {
        let field = field.into();
        Self::new(
            &field,
            format!("field '{}' must be >= {} (got {})", field, min, actual),
            ValidationKind::MinValue { min, actual },
        )
    }

    pub fn rejected(field: impl Into<String>, reason: impl Into<String>) -> Self {
        let field = field.into();
        let reason = reason.into();
        Self::new(&field, format!("field '{}' rejected: {}", field, reason), ValidationKind::Rejected)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationKind {
    Required,
    OutOfRange { min: f64, max: f64, actual: f64 },
    MinValue { min: f64, actual: f64 },
    Rejected,
}

pub trait FieldValidator {
    fn is_empty(&self) -> bool;
}

impl FieldValidator for String {
    fn is_empty(&self) -> bool {
        self.is_empty()
    }
}

impl<T> FieldValidator for Vec<T> {
    fn is_empty(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! impl_field_validator_numeric {
    ($($t:ty),*) => {
        $(
            impl FieldValidator for $t {
                fn is_empty(&self) -> bool {
                    false
                }
            }
        )*
    };
}

impl_field_validator_numeric!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64, bool);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::required("sensor_id");
        assert!(err.to_string().contains("sensor_id"));
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_field_validator() {
        assert!(String::new().is_empty());
        assert!(!String::from("hello").is_empty());
        assert!(Vec::<u8>::new().is_empty());
        assert!(!42u64.is_empty());
    }
}
