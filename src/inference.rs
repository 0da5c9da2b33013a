use crate::error::ServiceResult;
use crate::predictor::{Predictor, PredictorError};
use crate::schema::{FeatureRecord, FeatureRow};
use crate::table::{FeatureTable, PredictedTable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_type: String,
    pub predicted_probability: f64,
}

/// Wraps the process-wide predictor. Cloning is cheap and every clone shares
/// the same read-only model.
#[derive(Clone)]
pub struct InferenceService {
    predictor: Arc<dyn Predictor>,
}

impl InferenceService {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        InferenceService { predictor }
    }

    pub fn classes(&self) -> &[String] {
        self.predictor.classes()
    }

    /// Predicts a single record. The probability is the largest class
    /// probability of the row, regardless of how low it is.
    pub fn predict_one(&self, record: &FeatureRecord) -> ServiceResult<PredictionResult> {
        let rows: [FeatureRow; 1] = [record.to_row()];

        let labels = self.predictor.predict(&rows)?;
        let probabilities = self.predictor.predict_proba(&rows)?;
        check_len(rows.len(), labels.len())?;
        check_len(rows.len(), probabilities.len())?;

        let predicted_probability = probabilities[0]
            .iter()
            .copied()
            .reduce(f64::max)
            .ok_or(PredictorError::EmptyProbabilities { row: 0 })?;
        let predicted_type = labels.into_iter().next().unwrap_or_default();

        log::debug!(
            "Predicted {} (p={:.4}) for {:?}",
            predicted_type,
            predicted_probability,
            record
        );
        Ok(PredictionResult {
            predicted_type,
            predicted_probability,
        })
    }

    /// Predicts every row of an already reconciled table in one batched call.
    pub fn predict_many(&self, table: FeatureTable) -> ServiceResult<PredictedTable> {
        let rows: Vec<FeatureRow> = table.rows().iter().map(FeatureRecord::to_row).collect();
        let labels = self.predictor.predict(&rows)?;
        check_len(rows.len(), labels.len())?;
        Ok(table.with_labels(labels))
    }
}

fn check_len(expected: usize, got: usize) -> Result<(), PredictorError> {
    if expected != got {
        return Err(PredictorError::ShapeMismatch { expected, got });
    }
    Ok(())
}
