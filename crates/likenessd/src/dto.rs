//! JSON shapes of the HTTP API.
//!
//! Requests carry the input as the first element of `{"data": [..]}` and
//! responses wrap the single output the same way.

use likeness_core::input::encode_png_data_url;
use likeness_core::{AgeReply, ImageRequest, SimilarityReply};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default)]
    pub data: Vec<Value>,
}

impl PredictRequest {
    /// The first element decides the request shape; a missing one means no input.
    pub fn into_image_request(self) -> ImageRequest {
        self.data
            .into_iter()
            .next()
            .map(ImageRequest::from)
            .unwrap_or(ImageRequest::Empty)
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub data: Vec<Value>,
}

impl PredictResponse {
    pub fn single(value: Value) -> Self {
        Self { data: vec![value] }
    }
}

pub fn age_json(reply: AgeReply) -> Value {
    match reply {
        AgeReply::Message(message) => Value::String(message),
        AgeReply::Null => Value::Null,
        AgeReply::EmptySequence => Value::Array(Vec::new()),
    }
}

pub fn similarity_json(reply: SimilarityReply) -> Result<Value, image::ImageError> {
    match reply {
        SimilarityReply::Gallery(items) => {
            // Images travel as PNG data URLs next to their captions.
            let entries = items
                .into_iter()
                .map(|item| {
                    let image = encode_png_data_url(&item.image)?;
                    Ok(json!({ "image": image, "caption": item.caption }))
                })
                .collect::<Result<Vec<_>, image::ImageError>>()?;
            Ok(Value::Array(entries))
        }
        SimilarityReply::Null => Ok(Value::Null),
        SimilarityReply::EmptySequence => Ok(Value::Array(Vec::new())),
    }
}
