//! TOML manifest describing an exported model and its preprocessing.
//!
//! ```toml
//! task = "classification"
//! model = "identity.onnx"
//! input_size = 224
//! mean = [0.485, 0.456, 0.406]
//! std = [0.229, 0.224, 0.225]
//! labels = "labels.txt"
//! softmax = true
//! ```
//!
//! Relative paths resolve against the manifest's own directory.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ImageNet statistics, the default normalization for pretrained vision backbones.
const DEFAULT_INPUT_SIZE: u32 = 224;
const DEFAULT_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const DEFAULT_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// What the model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Regression,
    Classification,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelManifest {
    pub task: Task,
    /// Path to the `.onnx` file.
    pub model: PathBuf,
    /// Edge length of the square model input.
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Per-channel mean on [0, 1] pixel values.
    #[serde(default = "default_mean")]
    pub mean: [f32; 3],
    #[serde(default = "default_std")]
    pub std: [f32; 3],
    /// Vocabulary file, one label per line (classification only).
    #[serde(default)]
    pub labels: Option<PathBuf>,
    /// Whether output 0 holds logits that need a softmax.
    #[serde(default)]
    pub softmax: bool,
}

fn default_input_size() -> u32 {
    DEFAULT_INPUT_SIZE
}

fn default_mean() -> [f32; 3] {
    DEFAULT_MEAN
}

fn default_std() -> [f32; 3] {
    DEFAULT_STD
}

impl ModelManifest {
    /// Read and validate a manifest file.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let src = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&src, base_dir)
    }

    /// Parse manifest text, resolving relative paths against `base_dir`.
    pub fn parse(src: &str, base_dir: &Path) -> Result<Self, ManifestError> {
        let mut manifest: ModelManifest = toml::from_str(src)?;
        manifest.model = base_dir.join(&manifest.model);
        manifest.labels = manifest.labels.map(|l| base_dir.join(l));
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        if self.input_size == 0 {
            return Err(ManifestError::Invalid("input_size must be positive".into()));
        }
        if self.std.iter().any(|s| *s == 0.0) {
            return Err(ManifestError::Invalid("std entries must be non-zero".into()));
        }
        if self.task == Task::Classification && self.labels.is_none() {
            return Err(ManifestError::Invalid(
                "classification models need a labels file".into(),
            ));
        }
        Ok(())
    }

    /// Read the class vocabulary. Regression models have none.
    pub fn read_labels(&self) -> Result<Vec<String>, ManifestError> {
        let Some(path) = &self.labels else {
            return Ok(Vec::new());
        };
        let src = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        // Labels are matched verbatim against gallery file names, so only
        // line endings are stripped. Line N is class index N-1.
        src.lines()
            .map(|l| l.trim_end_matches('\r'))
            .enumerate()
            .map(|(i, l)| {
                if l.is_empty() {
                    Err(ManifestError::Invalid(format!(
                        "{}: line {} is blank",
                        path.display(),
                        i + 1
                    )))
                } else {
                    Ok(l.to_string())
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_regression_with_defaults() {
        let m = ModelManifest::parse(
            "task = \"regression\"\nmodel = \"age.onnx\"\n",
            Path::new("/models"),
        )
        .unwrap();
        assert_eq!(m.task, Task::Regression);
        assert_eq!(m.model, PathBuf::from("/models/age.onnx"));
        assert_eq!(m.input_size, 224);
        assert_eq!(m.mean, DEFAULT_MEAN);
        assert_eq!(m.std, DEFAULT_STD);
        assert!(!m.softmax);
        assert!(m.labels.is_none());
    }

    #[test]
    fn test_classification_requires_labels() {
        let err = ModelManifest::parse(
            "task = \"classification\"\nmodel = \"id.onnx\"\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn test_zero_std_rejected() {
        let err = ModelManifest::parse(
            "task = \"regression\"\nmodel = \"a.onnx\"\nstd = [0.2, 0.0, 0.2]\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, ManifestError::Invalid(_)));
    }

    #[test]
    fn test_unknown_task_rejected() {
        let err = ModelManifest::parse("task = \"detection\"\nmodel = \"a.onnx\"\n", Path::new("."))
            .unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn test_load_reads_labels_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("identity.toml"),
            "task = \"classification\"\nmodel = \"identity.onnx\"\nlabels = \"labels.txt\"\nsoftmax = true\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("labels.txt"), "Brad_Pitt\r\n Cher\nO'Neal\n").unwrap();

        let m = ModelManifest::load(&dir.path().join("identity.toml")).unwrap();
        assert!(m.softmax);
        assert_eq!(m.model, dir.path().join("identity.onnx"));
        assert_eq!(m.read_labels().unwrap(), vec!["Brad_Pitt", " Cher", "O'Neal"]);
    }

    #[test]
    fn test_blank_label_line_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("labels.txt"), "A\n\nB\n").unwrap();
        let m = ModelManifest::parse(
            "task = \"classification\"\nmodel = \"identity.onnx\"\nlabels = \"labels.txt\"\n",
            dir.path(),
        )
        .unwrap();
        match m.read_labels().unwrap_err() {
            ManifestError::Invalid(msg) => assert!(msg.contains("line 2"), "{msg}"),
            other => panic!("expected invalid manifest, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = ModelManifest::load(Path::new("/nonexistent/likeness.toml")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
