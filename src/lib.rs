pub mod bulk;
pub mod config;
pub mod error;
pub mod inference;
pub mod logging;
pub mod predictor;
pub mod schema;
pub mod server;
pub mod table;

pub use error::{ServiceError, ServiceResult};
pub use inference::{InferenceService, PredictionResult};
pub use predictor::{LinearPipeline, Predictor, PredictorError};
pub use schema::FeatureRecord;
