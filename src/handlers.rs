use crate::classifier::Classifier;
use crate::error::{GatewayError, Result};
use crate::gateway;
use crate::models::{Base64ImageRequest, HealthResponse, PredictionResponse};
use actix_multipart::Multipart;
use actix_web::error::JsonPayloadError;
use actix_web::{get, post, web, HttpResponse};
use futures_util::StreamExt;
use std::sync::Arc;
use uuid::Uuid;

const FILE_FIELD: &str = "file";

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub classifier: Arc<dyn Classifier>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(classifier: Arc<dyn Classifier>, max_upload_bytes: usize) -> Self {
        Self {
            classifier,
            max_upload_bytes,
        }
    }
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse::ok())
}

#[post("/predict/upload")]
pub async fn predict_upload(
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse> {
    let bytes = read_file_field(&mut payload, state.max_upload_bytes).await?;
    let classifier = Arc::clone(&state.classifier);

    let outcome =
        web::block(move || gateway::predict_bytes(classifier.as_ref(), &bytes)).await?;
    respond("upload", outcome)
}

#[post("/predict/base64")]
pub async fn predict_base64(
    state: web::Data<AppState>,
    req: web::Json<Base64ImageRequest>,
) -> Result<HttpResponse> {
    let payload = req.into_inner().image_base64;
    let classifier = Arc::clone(&state.classifier);

    let outcome = web::block(move || {
        let bytes = gateway::decode_base64(&payload)?;
        gateway::predict_bytes(classifier.as_ref(), &bytes)
    })
    .await?;
    respond("base64", outcome)
}

fn respond(source: &str, outcome: Result<PredictionResponse>) -> Result<HttpResponse> {
    let request_id = Uuid::new_v4();
    match outcome {
        Ok(prediction) => {
            log::info!(
                "[{}] {} prediction: {} ({:.4})",
                request_id,
                source,
                prediction.label,
                prediction.confidence
            );
            Ok(HttpResponse::Ok().json(prediction))
        }
        Err(e) => {
            if e.is_client_fault() {
                log::warn!("[{}] {} rejected: {}", request_id, source, e);
            } else {
                log::error!("[{}] {} failed: {}", request_id, source, e);
            }
            Err(e)
        }
    }
}

/// Buffers the `file` field in memory, draining any other fields.
async fn read_file_field(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>> {
    let mut file = None;

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let is_file = field.content_disposition().get_name() == Some(FILE_FIELD);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if !is_file {
                continue;
            }
            if data.len() + chunk.len() > limit {
                return Err(GatewayError::PayloadTooLarge { limit });
            }
            data.extend_from_slice(&chunk);
        }

        if is_file && file.is_none() {
            file = Some(data);
        }
    }

    file.ok_or_else(|| GatewayError::Payload(format!("missing `{}` field", FILE_FIELD)))
}

/// Headroom for the JSON envelope and any data URL prefix around the base64 text.
const JSON_ENVELOPE_BYTES: usize = 1024;

/// Body limit for `/predict/base64` that admits any image within the upload limit.
pub fn json_limit(upload_limit: usize) -> usize {
    upload_limit.saturating_add(2) / 3 * 4 + JSON_ENVELOPE_BYTES
}

/// JSON extractor settings for `/predict/base64`; rejections use the gateway error body.
pub fn json_config(upload_limit: usize) -> web::JsonConfig {
    let limit = json_limit(upload_limit);
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(move |err, _req| {
            let err = match err {
                JsonPayloadError::Overflow { .. }
                | JsonPayloadError::OverflowKnownLength { .. } => {
                    GatewayError::PayloadTooLarge { limit }
                }
                other => GatewayError::Payload(other.to_string()),
            };
            log::warn!("rejected JSON body: {}", err);
            err.into()
        })
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(predict_upload)
        .service(predict_base64);
}
