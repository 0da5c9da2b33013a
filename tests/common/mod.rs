#![allow(dead_code)]

use star_type_rs::predictor::{LinearPipeline, Predictor, PredictorError};
use star_type_rs::schema::FeatureRow;
use std::path::Path;
use std::sync::Arc;

pub const BOUNDARY: &str = "----star-type-test-boundary";

/// Builds a `multipart/form-data` body with a single file part.
pub fn multipart_body(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

pub fn shipped_pipeline() -> Arc<dyn Predictor> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("models/star_type_pipeline.json");
    Arc::new(LinearPipeline::load(path).unwrap())
}

/// Always fails, standing in for a broken model.
pub struct BrokenPredictor {
    classes: Vec<String>,
}

impl BrokenPredictor {
    pub fn new() -> Self {
        BrokenPredictor {
            classes: vec!["Unknown".to_string()],
        }
    }
}

impl Predictor for BrokenPredictor {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, _rows: &[FeatureRow]) -> Result<Vec<String>, PredictorError> {
        Err(PredictorError::Model("weights are corrupt".to_string()))
    }

    fn predict_proba(&self, _rows: &[FeatureRow]) -> Result<Vec<Vec<f64>>, PredictorError> {
        Err(PredictorError::Model("weights are corrupt".to_string()))
    }
}
