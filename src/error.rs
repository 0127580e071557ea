use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid base64 payload: {0}")]
    Encoding(String),

    #[error("could not decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("invalid request payload: {0}")]
    Payload(String),

    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Encoding(_) => "encoding_error",
            GatewayError::ImageDecode(_) => "image_decode_error",
            GatewayError::Payload(_) => "payload_error",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::Inference(_) => "inference_error",
            GatewayError::ModelLoad(_) => "model_load_error",
        }
    }

    pub fn is_client_fault(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Encoding(_)
            | GatewayError::ImageDecode(_)
            | GatewayError::Payload(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Inference(_) | GatewayError::ModelLoad(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = if self.is_client_fault() {
            self.to_string()
        } else {
            "Internal error. Check server logs for details.".to_string()
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": message,
        }))
    }
}

impl From<base64::DecodeError> for GatewayError {
    fn from(e: base64::DecodeError) -> Self {
        GatewayError::Encoding(e.to_string())
    }
}

impl From<actix_multipart::MultipartError> for GatewayError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        GatewayError::Payload(e.to_string())
    }
}

impl From<actix_web::error::BlockingError> for GatewayError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        GatewayError::Inference(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn client_faults_map_to_bad_request() {
        let err = base64::engine::general_purpose::STANDARD
            .decode("not-base64!!")
            .unwrap_err();
        let err = GatewayError::from(err);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "encoding_error");
        assert!(err.is_client_fault());

        let err = GatewayError::Payload("missing `file` field".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn server_faults_hide_details() {
        let err = GatewayError::Inference("tensor shape mismatch".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_client_fault());

        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn oversized_payload_is_413() {
        let err = GatewayError::PayloadTooLarge { limit: 16 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_string(), "payload exceeds the 16 byte limit");
    }
}
