use crate::error::{GatewayError, Result};
use crate::models::Prediction;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use std::path::Path;
use tract_onnx::prelude::*;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;
/// Shortest edge the `INPUT_SIZE` center crop is taken relative to.
pub const RESIZE_SHORTEST_EDGE: u32 = 256;

const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
const STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Maps an RGB image to every class it knows, highest score first.
///
/// Implementations are shared read-only across request handlers.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>>;
}

type OnnxPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct OnnxClassifier {
    model: OnnxPlan,
    labels: Vec<String>,
}

impl OnnxClassifier {
    /// Loads and optimizes the model once. Called at startup only.
    pub fn load(model_path: &Path, labels: Vec<String>) -> Result<Self> {
        let side = INPUT_SIZE as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|e| {
                log::error!("Failed to load ONNX model {}: {}", model_path.display(), e);
                GatewayError::ModelLoad(e.to_string())
            })?
            .with_input_fact(0, f32::fact([1, 3, side, side]).into())
            .map_err(|e| GatewayError::ModelLoad(e.to_string()))?
            .into_optimized()
            .map_err(|e| {
                log::error!("Failed to optimize ONNX model: {}", e);
                GatewayError::ModelLoad(e.to_string())
            })?
            .into_runnable()
            .map_err(|e| {
                log::error!("Failed to make model runnable: {}", e);
                GatewayError::ModelLoad(e.to_string())
            })?;

        Ok(Self { model, labels })
    }

}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Vec<Prediction>> {
        let input = preprocess(image)?;
        let side = INPUT_SIZE as usize;
        let tensor = tract_ndarray::Array::from_shape_vec((1, 3, side, side), input.into_raw_vec())
            .map_err(|e| GatewayError::Inference(e.to_string()))?
            .into_tensor();

        let result = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|e| GatewayError::Inference(e.to_string()))?;

        let output = result
            .first()
            .ok_or_else(|| GatewayError::Inference("model produced no outputs".into()))?;
        let logits: Vec<f32> = output
            .to_array_view::<f32>()
            .map_err(|e| GatewayError::Inference(e.to_string()))?
            .iter()
            .copied()
            .collect();

        rank(&self.labels, &softmax(&logits))
    }
}

/// Center crop and resize, then normalize into NCHW.
///
/// The crop is the region a shortest-edge resize to `RESIZE_SHORTEST_EDGE`
/// followed by an `INPUT_SIZE` center crop would keep, taken in source
/// coordinates so only that square is ever resampled.
pub fn preprocess(image: &RgbImage) -> Result<Array4<f32>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(GatewayError::Inference("image has no pixels".into()));
    }

    let shortest = width.min(height);
    let ratio = INPUT_SIZE as f64 / RESIZE_SHORTEST_EDGE as f64;
    let crop = ((shortest as f64 * ratio).round() as u32).clamp(1, shortest);
    let x = (width - crop) / 2;
    let y = (height - crop) / 2;
    let square = imageops::crop_imm(image, x, y, crop, crop).to_image();
    let cropped = imageops::resize(&square, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let side = INPUT_SIZE as usize;
    Ok(Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
        let pixel = cropped.get_pixel(x as u32, y as u32);
        (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c]
    }))
}

pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Pairs scores with labels and sorts them descending.
pub fn rank(labels: &[String], scores: &[f32]) -> Result<Vec<Prediction>> {
    if scores.len() != labels.len() {
        return Err(GatewayError::Inference(format!(
            "model returned {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }

    let mut predictions: Vec<Prediction> = labels
        .iter()
        .zip(scores)
        .map(|(label, &score)| Prediction::new(label.clone(), score))
        .collect();
    predictions.sort_by(|a, b| b.score.total_cmp(&a.score));
    Ok(predictions)
}
