//! Predictor abstraction shared by the age and lookalike services.

use crate::manifest::{ManifestError, ModelManifest};
use crate::onnx::OnnxPredictor;
use crate::types::{CanonicalImage, RawPrediction};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictorError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("model file not found: {0} (export the model to ONNX and point the manifest at it)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A loaded model that maps one image to one raw prediction.
///
/// Implementations must not mutate shared state visible to other callers:
/// the same predictor serves every in-flight request.
pub trait Predictor: Send + Sync {
    fn infer(&self, image: &CanonicalImage) -> Result<RawPrediction, PredictorError>;

    /// Ordered class labels for classifiers. Empty for regressors.
    fn vocab(&self) -> &[String] {
        &[]
    }
}

/// Process-wide handle to a model that may have failed to load at startup.
#[derive(Clone)]
pub enum ModelHandle {
    Loaded(Arc<dyn Predictor>),
    Unavailable { reason: String },
}

impl ModelHandle {
    /// Load an ONNX model from its manifest.
    ///
    /// A failure is logged and captured as [`ModelHandle::Unavailable`] so the
    /// service keeps answering (with empty results) instead of refusing to start.
    pub fn from_manifest(path: &Path) -> Self {
        let loaded = ModelManifest::load(path)
            .map_err(PredictorError::from)
            .and_then(|manifest| OnnxPredictor::load(&manifest));
        match loaded {
            Ok(predictor) => {
                tracing::info!(manifest = %path.display(), "model loaded");
                ModelHandle::Loaded(Arc::new(predictor))
            }
            Err(e) => {
                tracing::warn!(
                    manifest = %path.display(),
                    error = %e,
                    "model failed to load; requests will return empty results"
                );
                ModelHandle::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelHandle::Loaded(_))
    }

    pub fn infer(&self, image: &CanonicalImage) -> Result<RawPrediction, PredictorError> {
        match self {
            ModelHandle::Loaded(predictor) => predictor.infer(image),
            ModelHandle::Unavailable { reason } => {
                Err(PredictorError::ModelUnavailable(reason.clone()))
            }
        }
    }

    pub fn vocab(&self) -> &[String] {
        match self {
            ModelHandle::Loaded(predictor) => predictor.vocab(),
            ModelHandle::Unavailable { .. } => &[],
        }
    }
}

impl<P: Predictor + 'static> From<P> for ModelHandle {
    fn from(predictor: P) -> Self {
        ModelHandle::Loaded(Arc::new(predictor))
    }
}
