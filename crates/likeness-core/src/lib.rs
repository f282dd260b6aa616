//! likeness-core: inference pipeline for face age and lookalike prediction.
//!
//! Normalizes uploaded images and data URLs, runs ONNX-exported models via
//! ONNX Runtime, and shapes results: a formatted age string, or a top-k
//! gallery of reference identities.

pub mod format;
pub mod input;
pub mod manifest;
pub mod onnx;
pub mod predictor;
pub mod ranker;
pub mod service;
pub mod types;

pub use input::{ImageRequest, InputError};
pub use manifest::ModelManifest;
pub use onnx::OnnxPredictor;
pub use predictor::{ModelHandle, Predictor, PredictorError};
pub use ranker::AssetIndex;
pub use service::{AgeReply, AgeService, Outcome, SimilarityReply, SimilarityService};
pub use types::{
    CanonicalImage, Classification, GalleryItem, RankedMatch, RawPrediction, RegressionOutput,
};
