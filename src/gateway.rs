//! Decoding and response shaping between the HTTP handlers and the classifier.
//!
//! Every function here is synchronous. Handlers run them inside `web::block`.

use crate::classifier::Classifier;
use crate::error::{GatewayError, Result};
use crate::models::{Prediction, PredictionResponse};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use image::RgbImage;
use std::collections::HashMap;

/// Decodes a base64 string, accepting an optional `data:<mime>;base64,` prefix.
///
/// ASCII whitespace anywhere in the payload is ignored, so line-wrapped output decodes.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim();
    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((meta, data)) if meta.ends_with(";base64") => data,
            _ => {
                return Err(GatewayError::Encoding(
                    "data URL is not base64 encoded".into(),
                ))
            }
        },
        None => payload,
    };
    let compact: Vec<u8> = encoded
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(BASE64_STANDARD.decode(compact)?)
}

/// Decodes any supported format and drops alpha/palette/grayscale into RGB.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgb8())
}

/// Builds the response from the full classifier output.
///
/// Top-1 is the maximum score, not whatever sits at index 0. Ties go to the
/// class the classifier listed first.
pub fn shape_response(predictions: Vec<Prediction>) -> Result<PredictionResponse> {
    let mut top: Option<(String, f32)> = None;
    let mut all_probs: HashMap<String, f32> = HashMap::with_capacity(predictions.len());

    for p in predictions {
        if !(0.0..=1.0).contains(&p.score) {
            return Err(GatewayError::Inference(format!(
                "classifier returned score {} for {}, outside [0, 1]",
                p.score, p.label
            )));
        }
        if top.as_ref().map_or(true, |(_, best)| p.score > *best) {
            top = Some((p.label.clone(), p.score));
        }
        all_probs
            .entry(p.label)
            .and_modify(|s| *s = s.max(p.score))
            .or_insert(p.score);
    }

    let (label, confidence) =
        top.ok_or_else(|| GatewayError::Inference("classifier returned no classes".into()))?;

    Ok(PredictionResponse {
        label,
        confidence,
        all_probs,
    })
}

/// Full pipeline for one image: decode, classify, shape.
pub fn predict_bytes(classifier: &dyn Classifier, bytes: &[u8]) -> Result<PredictionResponse> {
    let image = decode_image(bytes)?;
    let predictions = classifier.classify(&image)?;
    shape_response(predictions)
}
