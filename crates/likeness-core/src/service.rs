//! Request handlers for the age and lookalike services.
//!
//! Both handlers run the same pipeline: availability check, input
//! normalization, inference, then formatting (age) or ranking (lookalike).
//! Every path ends in a well-formed reply; errors are logged at the boundary
//! and converted into each service's failure shape.

use crate::format::format_age;
use crate::input::{normalize, ImageRequest, InputError, Normalized};
use crate::predictor::{ModelHandle, PredictorError};
use crate::ranker::{self, AssetIndex, RankError, TOP_K};
use crate::types::{CanonicalImage, GalleryItem, RawPrediction};
use std::error::Error as _;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Predictor(#[from] PredictorError),
    #[error(transparent)]
    Rank(#[from] RankError),
    #[error("model returned a regression output where class scores were expected")]
    UnexpectedPrediction,
}

/// Why a request produced an empty result without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftFail {
    ModelUnavailable,
    UnsupportedInput,
}

/// Result of one pass through a service pipeline.
#[derive(Debug)]
pub enum Outcome<T> {
    Value(T),
    /// No input was provided.
    Empty,
    SoftFail(SoftFail),
    HardFail(ServiceError),
}

/// Age service reply, as returned to the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum AgeReply {
    Message(String),
    Null,
    EmptySequence,
}

/// Lookalike service reply, as returned to the transport layer.
#[derive(Debug, Clone)]
pub enum SimilarityReply {
    Gallery(Vec<GalleryItem>),
    Null,
    EmptySequence,
}

/// Shared front half of both pipelines.
fn prepare(model: &ModelHandle, request: ImageRequest) -> Result<CanonicalImage, Outcome<()>> {
    if !model.is_loaded() {
        return Err(Outcome::SoftFail(SoftFail::ModelUnavailable));
    }
    match normalize(request) {
        Ok(Normalized::Image(image)) => Ok(image),
        Ok(Normalized::Empty) => Err(Outcome::Empty),
        Ok(Normalized::Unsupported) => Err(Outcome::SoftFail(SoftFail::UnsupportedInput)),
        Err(e) => Err(Outcome::HardFail(e.into())),
    }
}

impl Outcome<()> {
    fn retype<T>(self) -> Outcome<T> {
        match self {
            Outcome::Value(()) | Outcome::Empty => Outcome::Empty,
            Outcome::SoftFail(reason) => Outcome::SoftFail(reason),
            Outcome::HardFail(e) => Outcome::HardFail(e),
        }
    }
}

/// Log a failed request with its full source chain.
fn log_failure(service: &'static str, err: &ServiceError) {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    tracing::error!(service, error = %err, ?chain, "request failed");
}

/// Predicts an age from a face photo.
pub struct AgeService {
    model: ModelHandle,
}

impl AgeService {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Run the pipeline and report the raw outcome.
    pub fn handle(&self, request: ImageRequest) -> Outcome<String> {
        tracing::info!(input = request.kind(), "age predict called");
        let image = match prepare(&self.model, request) {
            Ok(image) => image,
            Err(outcome) => return outcome.retype(),
        };

        tracing::info!("running prediction");
        match self.model.infer(&image) {
            Ok(raw) => {
                let out = format_age(&raw);
                tracing::info!(result = %out, "age predicted");
                Outcome::Value(out)
            }
            Err(e) => Outcome::HardFail(e.into()),
        }
    }

    /// Entry point: run the pipeline and shape the reply.
    pub fn predict(&self, request: ImageRequest) -> AgeReply {
        match self.handle(request) {
            Outcome::Value(message) => AgeReply::Message(message),
            Outcome::Empty => AgeReply::Null,
            Outcome::SoftFail(_) => AgeReply::EmptySequence,
            Outcome::HardFail(err) => {
                log_failure("age", &err);
                AgeReply::Message(format!("Error processing image: {err}"))
            }
        }
    }
}

/// Finds the gallery identities a face photo most resembles.
pub struct SimilarityService {
    model: ModelHandle,
    assets: AssetIndex,
    top_k: usize,
}

impl SimilarityService {
    pub fn new(model: ModelHandle, assets: AssetIndex) -> Self {
        Self {
            model,
            assets,
            top_k: TOP_K,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn assets(&self) -> &AssetIndex {
        &self.assets
    }

    /// Run the pipeline and report the raw outcome.
    pub fn handle(&self, request: ImageRequest) -> Outcome<Vec<GalleryItem>> {
        tracing::info!(input = request.kind(), "similarity predict called");
        let image = match prepare(&self.model, request) {
            Ok(image) => image,
            Err(outcome) => return outcome.retype(),
        };

        tracing::info!("running prediction");
        match self.lookalikes(&image) {
            Ok(gallery) => {
                tracing::info!(matches = gallery.len(), "found matches");
                Outcome::Value(gallery)
            }
            Err(e) => Outcome::HardFail(e),
        }
    }

    fn lookalikes(&self, image: &CanonicalImage) -> Result<Vec<GalleryItem>, ServiceError> {
        let classification = match self.model.infer(image)? {
            RawPrediction::Classification(c) => c,
            RawPrediction::Regression(_) => return Err(ServiceError::UnexpectedPrediction),
        };
        tracing::debug!(
            label = %classification.label,
            index = classification.index,
            "top class"
        );
        let matches = ranker::rank(
            &classification.probabilities,
            self.model.vocab(),
            &self.assets,
            self.top_k,
        )?;
        Ok(ranker::into_gallery(matches)?)
    }

    /// Entry point: run the pipeline and shape the reply.
    ///
    /// Unlike the age service, failures surface as an empty gallery.
    pub fn predict(&self, request: ImageRequest) -> SimilarityReply {
        match self.handle(request) {
            Outcome::Value(gallery) => SimilarityReply::Gallery(gallery),
            Outcome::Empty => SimilarityReply::Null,
            Outcome::SoftFail(_) => SimilarityReply::EmptySequence,
            Outcome::HardFail(err) => {
                log_failure("similarity", &err);
                SimilarityReply::EmptySequence
            }
        }
    }
}
