//! Configuration errors raised synchronously by unit setters.
//!
//! The render path never fails: out-of-range signal values are clamped per
//! sample with the same domain tables that validate these setters.

use thiserror::Error;

/// Errors produced when a parameter value cannot be accepted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("{unit}.{param}: invalid value {value}, expected {domain}")]
    InvalidParameter {
        unit: &'static str,
        param: String,
        value: String,
        domain: String,
    },

    #[error("{unit}.{param}: {reason}")]
    ConfigurationConflict {
        unit: &'static str,
        param: String,
        reason: String,
    },
}

impl ParamError {
    pub fn invalid(
        unit: &'static str,
        param: impl Into<String>,
        value: impl ToString,
        domain: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            unit,
            param: param.into(),
            value: value.to_string(),
            domain: domain.into(),
        }
    }

    pub fn conflict(unit: &'static str, param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigurationConflict {
            unit,
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Name of the parameter that was rejected.
    pub fn param(&self) -> &str {
        match self {
            Self::InvalidParameter { param, .. } | Self::ConfigurationConflict { param, .. } => param,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParamError>;

/// Failure to hand a change to a unit running on another thread.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SendError {
    #[error("control queue is full")]
    Full,

    #[error(transparent)]
    Param(#[from] ParamError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_parameter_and_domain() {
        let err = ParamError::invalid("PWM", "freq", -3.0, "a frequency in (0, 96000] Hz");
        let text = err.to_string();
        assert!(text.contains("PWM.freq"));
        assert!(text.contains("-3"));
        assert!(text.contains("(0, 96000]"));
        assert_eq!(err.param(), "freq");
    }

    #[test]
    fn conflict_carries_reason() {
        let err = ParamError::conflict("MatrixVerb", "echoesrange", "min 0.08 is greater than max 0.03");
        assert!(matches!(err, ParamError::ConfigurationConflict { .. }));
        assert!(err.to_string().contains("greater than max"));
    }

    #[test]
    fn send_error_wraps_param_error() {
        let err: SendError = ParamError::invalid("VCO", "freq", 0.0, "a frequency").into();
        assert!(matches!(err, SendError::Param(_)));
        assert!(err.to_string().contains("VCO.freq"));
    }
}
