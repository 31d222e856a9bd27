//! Tri-state result returned at public boundaries.

use serde::Serialize;
use tracing::error;

use crate::error::DhiError;

/// Metadata a caller needs to recover from a failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recovery {
    /// The file has no farm id column; assign one and retry.
    MissingFarmId { filename: String },
}

/// Outcome of a boundary operation: a payload, a recoverable failure, or a
/// fatal one. Expected failures never escape as errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Success { message: String, payload: T },
    Recoverable { message: String, recovery: Recovery },
    Fatal { message: String },
}

impl<T> Outcome<T> {
    pub fn success(message: impl Into<String>, payload: T) -> Self {
        Self::Success {
            message: message.into(),
            payload,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Converts an internal result, logging the error detail.
    ///
    /// A `MissingColumn` error that lacked a farm id becomes `Recoverable`;
    /// data-frame failures get a generic message since their text is not
    /// meaningful to an operator.
    pub fn from_result(
        result: Result<T, DhiError>,
        filename: &str,
        success_message: impl FnOnce(&T) -> String,
    ) -> Self {
        match result {
            Ok(payload) => {
                let message = success_message(&payload);
                Self::Success { message, payload }
            }
            Err(err) => {
                error!(file = %filename, error = %err, "operation failed");
                if err.is_missing_farm_id() {
                    return Self::Recoverable {
                        message: err.to_string(),
                        recovery: Recovery::MissingFarmId {
                            filename: filename.to_string(),
                        },
                    };
                }
                match err {
                    DhiError::DataFrame { .. } => {
                        Self::fatal(format!("internal error while processing {filename}"))
                    }
                    other => Self::fatal(other.to_string()),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. }
            | Self::Recoverable { message, .. }
            | Self::Fatal { message } => message,
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Success { message, payload } => Outcome::Success {
                message,
                payload: f(payload),
            },
            Self::Recoverable { message, recovery } => Outcome::Recoverable { message, recovery },
            Self::Fatal { message } => Outcome::Fatal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_farm_id_is_recoverable() {
        let result: Result<u32, DhiError> = Err(DhiError::MissingColumn {
            columns: vec!["胎次".to_string()],
            missing_farm_id: true,
        });
        let outcome = Outcome::from_result(result, "march.csv", |_| String::new());
        assert_eq!(
            outcome,
            Outcome::Recoverable {
                message: "missing required columns: 胎次".to_string(),
                recovery: Recovery::MissingFarmId {
                    filename: "march.csv".to_string()
                },
            }
        );
    }

    #[test]
    fn frame_errors_get_generic_message() {
        let result: Result<u32, DhiError> = Err(DhiError::DataFrame {
            message: "shape mismatch".to_string(),
        });
        let outcome = Outcome::from_result(result, "a.csv", |_| String::new());
        assert_eq!(outcome.message(), "internal error while processing a.csv");
        assert!(outcome.payload().is_none());
    }

    #[test]
    fn success_carries_payload() {
        let outcome = Outcome::from_result(Ok(3), "a.csv", |n| format!("{n} rows"));
        assert!(outcome.is_success());
        assert_eq!(outcome.message(), "3 rows");
        assert_eq!(outcome.map(|n| n * 2).into_payload(), Some(6));
    }
}
