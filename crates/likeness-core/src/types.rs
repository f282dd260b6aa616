use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Canonical in-memory image handed to predictors: always 8-bit, 3-channel RGB.
pub type CanonicalImage = RgbImage;

/// Raw output of a regression model (the age predictor).
///
/// Models disagree on shape: some emit a bare scalar, some a length-1 tensor,
/// some a numeric label. All of them are accepted here and coerced later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegressionOutput {
    Scalar(f64),
    Text(String),
    Sequence(Vec<RegressionOutput>),
}

impl RegressionOutput {
    /// The value a scalar is extracted from: the first element of a sequence,
    /// otherwise the value itself. `None` for an empty sequence.
    pub fn head(&self) -> Option<&RegressionOutput> {
        match self {
            RegressionOutput::Sequence(items) => items.first(),
            other => Some(other),
        }
    }
}

impl fmt::Display for RegressionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegressionOutput::Scalar(v) => write!(f, "{v}"),
            RegressionOutput::Text(s) => f.write_str(s),
            RegressionOutput::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Raw output of a multi-class classifier (the identity model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Label of the highest-probability class.
    pub label: String,
    /// Index of the highest-probability class in the vocabulary.
    pub index: usize,
    /// Probability for every class, indexed like the vocabulary.
    pub probabilities: Vec<f32>,
}

/// Model-specific result of a single inference call.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPrediction {
    Regression(RegressionOutput),
    Classification(Classification),
}

/// One ranked identity candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedMatch {
    pub label: String,
    /// Class probability in [0, 1].
    pub score: f32,
    /// Reference photo on disk, `None` when the gallery has no file for this label.
    pub image_path: Option<PathBuf>,
}

/// A rendered lookalike result: reference photo (or placeholder) plus caption.
#[derive(Debug, Clone)]
pub struct GalleryItem {
    pub image: RgbImage,
    pub caption: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_unwraps_sequence() {
        let raw = RegressionOutput::Sequence(vec![RegressionOutput::Scalar(42.37)]);
        assert_eq!(raw.head(), Some(&RegressionOutput::Scalar(42.37)));
    }

    #[test]
    fn test_head_of_empty_sequence() {
        assert_eq!(RegressionOutput::Sequence(vec![]).head(), None);
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(RegressionOutput::Scalar(42.37).to_string(), "42.37");
        assert_eq!(RegressionOutput::Text("unknown".into()).to_string(), "unknown");
        let seq = RegressionOutput::Sequence(vec![
            RegressionOutput::Scalar(1.5),
            RegressionOutput::Text("x".into()),
        ]);
        assert_eq!(seq.to_string(), "[1.5, x]");
    }

    #[test]
    fn test_regression_output_from_json() {
        let raw: RegressionOutput = serde_json::from_str("[42.37]").unwrap();
        assert_eq!(
            raw,
            RegressionOutput::Sequence(vec![RegressionOutput::Scalar(42.37)])
        );
        let raw: RegressionOutput = serde_json::from_str("\"unknown\"").unwrap();
        assert_eq!(raw, RegressionOutput::Text("unknown".into()));
    }
}
