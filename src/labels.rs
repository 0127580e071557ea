use crate::error::{GatewayError, Result};
use std::path::Path;

/// Hub identifier of the model the gateway is built around.
pub const MODEL_ID: &str = "linkanjarad/mobilenet_v2_1.0_224-plant-disease-identification";

/// Class names in model output order.
pub const PLANT_DISEASE_LABELS: [&str; 38] = [
    "Apple Scab",
    "Apple with Black Rot",
    "Cedar Apple Rust",
    "Healthy Apple",
    "Healthy Blueberry Plant",
    "Cherry with Powdery Mildew",
    "Healthy Cherry Plant",
    "Corn (Maize) with Cercospora and Gray Leaf Spot",
    "Corn (Maize) with Common Rust",
    "Corn (Maize) with Northern Leaf Blight",
    "Healthy Corn (Maize) Plant",
    "Grape with Black Rot",
    "Grape with Esca (Black Measles)",
    "Grape with Isariopsis Leaf Spot",
    "Healthy Grape Plant",
    "Orange with Citrus Greening",
    "Peach with Bacterial Spot",
    "Healthy Peach Plant",
    "Bell Pepper with Bacterial Spot",
    "Healthy Bell Pepper Plant",
    "Potato with Early Blight",
    "Potato with Late Blight",
    "Healthy Potato Plant",
    "Healthy Raspberry Plant",
    "Healthy Soybean Plant",
    "Squash with Powdery Mildew",
    "Strawberry with Leaf Scorch",
    "Healthy Strawberry Plant",
    "Tomato with Bacterial Spot",
    "Tomato with Early Blight",
    "Tomato with Late Blight",
    "Tomato with Leaf Mold",
    "Tomato with Septoria Leaf Spot",
    "Tomato with Spider Mites or Two-spotted Spider Mite",
    "Tomato with Target Spot",
    "Tomato Yellow Leaf Curl Virus",
    "Tomato Mosaic Virus",
    "Healthy Tomato Plant",
];

pub fn default_labels() -> Vec<String> {
    PLANT_DISEASE_LABELS.iter().map(|s| s.to_string()).collect()
}

/// Reads one label per line, skipping blank lines.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        GatewayError::ModelLoad(format!("cannot read labels {}: {}", path.display(), e))
    })?;
    parse_labels(&text)
}

pub fn parse_labels(text: &str) -> Result<Vec<String>> {
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    if labels.is_empty() {
        return Err(GatewayError::ModelLoad("label file is empty".into()));
    }
    Ok(labels)
}
