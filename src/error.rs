use thiserror::Error;

/// Errors reported to callers of the shooter core.
///
/// Numerical trouble (a ball that never lands, a target nobody can reach) is
/// not an error: results carry a `converged` flag instead.
#[derive(Debug, Error)]
pub enum ShooterError {
    #[error("invalid parameter `{field}`: {value} is outside [{min}, {max}]")]
    InvalidParameter {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("config error in field `{field}`: {message}")]
    ConfigParse { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ShooterError {
    pub fn invalid(field: &str, value: f64, min: f64, max: f64) -> Self {
        ShooterError::InvalidParameter {
            field: field.to_string(),
            value,
            min,
            max,
        }
    }

    pub fn config(field: &str, message: impl Into<String>) -> Self {
        ShooterError::ConfigParse {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Field named by a validation or parse failure, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            ShooterError::InvalidParameter { field, .. } | ShooterError::ConfigParse { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

/// Reject `value` unless it is finite and inside `[min, max]`.
pub(crate) fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ShooterError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ShooterError::invalid(field, value, min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_range_bounds_inclusive() {
        assert!(check_range("angle_deg", 10.0, 10.0, 80.0).is_ok());
        assert!(check_range("angle_deg", 80.0, 10.0, 80.0).is_ok());
        assert!(check_range("angle_deg", 80.0001, 10.0, 80.0).is_err());
        assert!(check_range("angle_deg", f64::NAN, 10.0, 80.0).is_err());
    }

    #[test]
    fn test_error_message_names_field() {
        let err = ShooterError::invalid("rpm", 6000.0, 1000.0, 5000.0);
        assert_eq!(err.field(), Some("rpm"));
        let message = err.to_string();
        assert!(message.contains("`rpm`"));
        assert!(message.contains("6000"));
    }
}
