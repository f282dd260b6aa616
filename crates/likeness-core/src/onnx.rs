//! ONNX Runtime predictor for exported age regressors and identity classifiers.

use crate::manifest::{ModelManifest, Task};
use crate::predictor::{Predictor, PredictorError};
use crate::types::{CanonicalImage, Classification, RawPrediction, RegressionOutput};
use image::imageops::{self, FilterType};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::sync::Mutex;

/// Image predictor backed by an ONNX Runtime session.
pub struct OnnxPredictor {
    // `Session::run` needs `&mut`; the lock keeps `infer(&self)` shareable.
    session: Mutex<Session>,
    task: Task,
    input_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    softmax: bool,
    vocab: Vec<String>,
}

impl OnnxPredictor {
    /// Load the model and vocabulary described by `manifest`.
    pub fn load(manifest: &ModelManifest) -> Result<Self, PredictorError> {
        if !manifest.model.exists() {
            return Err(PredictorError::ModelNotFound(
                manifest.model.display().to_string(),
            ));
        }

        let vocab = manifest.read_labels()?;

        let session = Session::builder()?
            .with_intra_threads(2)
            .map_err(ort::Error::from)?
            .commit_from_file(&manifest.model)?;

        tracing::info!(
            path = %manifest.model.display(),
            task = ?manifest.task,
            classes = vocab.len(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ONNX model"
        );

        Ok(Self {
            session: Mutex::new(session),
            task: manifest.task,
            input_size: manifest.input_size,
            mean: manifest.mean,
            std: manifest.std,
            softmax: manifest.softmax,
            vocab,
        })
    }

    fn run(&self, input: &Array4<f32>) -> Result<Vec<f32>, PredictorError> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| PredictorError::InferenceFailed("session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PredictorError::InferenceFailed(format!("output extraction: {e}")))?;
        Ok(data.to_vec())
    }
}

impl Predictor for OnnxPredictor {
    fn infer(&self, image: &CanonicalImage) -> Result<RawPrediction, PredictorError> {
        let input = preprocess(image, self.input_size, &self.mean, &self.std);
        let raw = self.run(&input)?;

        match self.task {
            Task::Regression => Ok(RawPrediction::Regression(RegressionOutput::Sequence(
                raw.into_iter()
                    .map(|v| RegressionOutput::Scalar(f64::from(v)))
                    .collect(),
            ))),
            Task::Classification => {
                let probabilities = if self.softmax { softmax(&raw) } else { raw };
                classify(probabilities, &self.vocab).map(RawPrediction::Classification)
            }
        }
    }

    fn vocab(&self) -> &[String] {
        &self.vocab
    }
}

/// Resize to `size × size` and normalize into a NCHW float tensor.
fn preprocess(image: &CanonicalImage, size: u32, mean: &[f32; 3], std: &[f32; 3]) -> Array4<f32> {
    let resized = if image.dimensions() == (size, size) {
        image.clone()
    } else {
        imageops::resize(image, size, size, FilterType::Triangle)
    };

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - mean[c]) / std[c];
        }
    }
    tensor
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.into_iter().map(|v| v / sum).collect()
    } else {
        exps
    }
}

/// Pick the top class and pair the probability vector with its label.
fn classify(probabilities: Vec<f32>, vocab: &[String]) -> Result<Classification, PredictorError> {
    if probabilities.len() != vocab.len() {
        return Err(PredictorError::InferenceFailed(format!(
            "model produced {} class scores for a vocabulary of {}",
            probabilities.len(),
            vocab.len()
        )));
    }

    // First maximum wins, matching the ranker's tie-break.
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        if best.map_or(true, |(_, b)| p > b) {
            best = Some((i, p));
        }
    }
    let (index, _) = best
        .ok_or_else(|| PredictorError::InferenceFailed("model produced no class scores".into()))?;

    Ok(Classification {
        label: vocab[index].clone(),
        index,
        probabilities,
    })
}
