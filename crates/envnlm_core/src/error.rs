//! Error type returned by the public entry points.
//!
//! Only precondition violations are errors. Degenerate data (empty octant
//! buckets, a flat descriptor range) has defined fallback values and never
//! reaches this type.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NlmError {
    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("Grid too large: needs {required} bytes, budget is {budget} bytes")]
    TooLarge { required: usize, budget: usize },
}

impl NlmError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type NlmResult<T> = Result<T, NlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = NlmError::parameter("radius", "must be >= 0");
        assert_eq!(err.to_string(), "Invalid parameter `radius`: must be >= 0");

        let err = NlmError::TooLarge {
            required: 10,
            budget: 5,
        };
        assert!(err.to_string().contains("needs 10 bytes"));
    }
}
