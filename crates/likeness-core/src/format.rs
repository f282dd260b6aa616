//! Human-readable rendering of age predictions.

use crate::types::{RawPrediction, RegressionOutput};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FormatError {
    #[error("prediction is an empty sequence")]
    EmptySequence,
    #[error("prediction is not numeric: {0}")]
    NotNumeric(String),
}

/// Render an age prediction as `"Predicted age: 42.4 years"`.
///
/// Falls back to the raw value's plain text when no number can be extracted.
/// Never fails.
pub fn format_age(raw: &RawPrediction) -> String {
    let fallback;
    let output = match raw {
        RawPrediction::Regression(output) => output,
        // Age classifiers emit the bucket label, which is usually numeric.
        RawPrediction::Classification(c) => {
            fallback = RegressionOutput::Text(c.label.clone());
            &fallback
        }
    };

    match age_value(output) {
        Ok(age) => format!("Predicted age: {age:.1} years"),
        Err(e) => {
            tracing::debug!(error = %e, "falling back to raw prediction text");
            output.to_string()
        }
    }
}

/// Extract the scalar age from a regression output.
pub fn age_value(output: &RegressionOutput) -> Result<f64, FormatError> {
    match output.head().ok_or(FormatError::EmptySequence)? {
        RegressionOutput::Scalar(v) => Ok(*v),
        RegressionOutput::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| FormatError::NotNumeric(s.clone())),
        nested @ RegressionOutput::Sequence(_) => Err(FormatError::NotNumeric(nested.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;

    fn regression(output: RegressionOutput) -> RawPrediction {
        RawPrediction::Regression(output)
    }

    #[test]
    fn test_scalar() {
        let out = format_age(&regression(RegressionOutput::Scalar(42.37)));
        assert_eq!(out, "Predicted age: 42.4 years");
    }

    #[test]
    fn test_single_element_sequence() {
        let raw = RegressionOutput::Sequence(vec![RegressionOutput::Scalar(42.37)]);
        assert_eq!(format_age(&regression(raw)), "Predicted age: 42.4 years");
    }

    #[test]
    fn test_numeric_text_coerces() {
        let out = format_age(&regression(RegressionOutput::Text(" 30 ".into())));
        assert_eq!(out, "Predicted age: 30.0 years");
    }

    #[test]
    fn test_non_numeric_falls_back() {
        let out = format_age(&regression(RegressionOutput::Text("unknown".into())));
        assert_eq!(out, "unknown");
    }

    #[test]
    fn test_empty_sequence_falls_back() {
        let out = format_age(&regression(RegressionOutput::Sequence(vec![])));
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_nested_sequence_falls_back() {
        let raw = RegressionOutput::Sequence(vec![RegressionOutput::Sequence(vec![
            RegressionOutput::Scalar(1.0),
        ])]);
        assert_eq!(format_age(&regression(raw)), "[[1]]");
    }

    #[test]
    fn test_classifier_label() {
        let raw = RawPrediction::Classification(Classification {
            label: "35".into(),
            index: 2,
            probabilities: vec![0.1, 0.2, 0.7],
        });
        assert_eq!(format_age(&raw), "Predicted age: 35.0 years");
    }

    #[test]
    fn test_age_value_errors() {
        assert_eq!(
            age_value(&RegressionOutput::Sequence(vec![])),
            Err(FormatError::EmptySequence)
        );
        assert_eq!(
            age_value(&RegressionOutput::Text("n/a".into())),
            Err(FormatError::NotNumeric("n/a".into()))
        );
    }
}
