//! The fitted classification model.
//!
//! Handlers only ever see the [`Predictor`] trait. The shipped implementation,
//! [`LinearPipeline`], is a fitted multinomial linear classifier serialized as
//! JSON: per-feature transforms, a standard scaler, then a softmax over the
//! linear decision function.

use crate::schema::{CANONICAL_COLUMNS, FEATURE_COUNT, FeatureRow};
use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PredictorError {
    #[error("feature '{column}' of row {row} is not finite after transformation")]
    NonFiniteFeature { row: usize, column: &'static str },

    #[error("predictor returned {got} outputs for {expected} rows")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("predictor returned an empty probability vector for row {row}")]
    EmptyProbabilities { row: usize },

    #[error("{0}")]
    Model(String),
}

/// An already-fitted classifier with a fixed positional input contract
/// (see [`CANONICAL_COLUMNS`]).
///
/// Implementations must be safe to call concurrently and must not mutate
/// internal state.
pub trait Predictor: Send + Sync {
    /// Class labels in the order used by [`Predictor::predict_proba`].
    fn classes(&self) -> &[String];

    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<String>, PredictorError>;

    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<Vec<f64>>, PredictorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureTransform {
    Identity,
    /// `sign(v) * log10(1 + |v|)`, defined for every real input.
    SignedLog10,
}

impl FeatureTransform {
    fn apply(self, v: f64) -> f64 {
        match self {
            FeatureTransform::Identity => v,
            FeatureTransform::SignedLog10 => {
                v.signum() * v.abs().ln_1p() / std::f64::consts::LN_10
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearPipeline {
    pub feature_names: Vec<String>,
    pub transforms: Vec<FeatureTransform>,
    pub scaler: StandardScaler,
    pub classes: Vec<String>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl LinearPipeline {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("opening model artifact {}", path.display()))?;
        let pipeline: LinearPipeline = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing model artifact {}", path.display()))?;
        pipeline
            .validate()
            .with_context(|| format!("validating model artifact {}", path.display()))?;
        Ok(pipeline)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feature_names != CANONICAL_COLUMNS {
            bail!(
                "artifact expects features {:?}, service provides {:?}",
                self.feature_names,
                CANONICAL_COLUMNS
            );
        }
        if self.transforms.len() != FEATURE_COUNT {
            bail!(
                "expected {} transforms, found {}",
                FEATURE_COUNT,
                self.transforms.len()
            );
        }
        if self.scaler.mean.len() != FEATURE_COUNT || self.scaler.scale.len() != FEATURE_COUNT {
            bail!("scaler must have {} mean and scale entries", FEATURE_COUNT);
        }
        if self.scaler.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            bail!("scaler scale entries must be finite and non-zero");
        }
        if self.classes.len() < 2 {
            bail!("at least two classes are required");
        }
        if self.coefficients.len() != self.classes.len()
            || self.intercepts.len() != self.classes.len()
        {
            bail!(
                "{} classes but {} coefficient rows and {} intercepts",
                self.classes.len(),
                self.coefficients.len(),
                self.intercepts.len()
            );
        }
        if let Some(row) = self.coefficients.iter().find(|c| c.len() != FEATURE_COUNT) {
            bail!(
                "coefficient rows must have {} entries, found {}",
                FEATURE_COUNT,
                row.len()
            );
        }
        Ok(())
    }

    fn standardize(&self, idx: usize, row: &FeatureRow) -> Result<FeatureRow, PredictorError> {
        let mut out = [0.0; FEATURE_COUNT];
        for (j, value) in out.iter_mut().enumerate() {
            let v = (self.transforms[j].apply(row[j]) - self.scaler.mean[j]) / self.scaler.scale[j];
            if !v.is_finite() {
                return Err(PredictorError::NonFiniteFeature {
                    row: idx,
                    column: CANONICAL_COLUMNS[j],
                });
            }
            *value = v;
        }
        Ok(out)
    }

    fn decision_function(&self, idx: usize, row: &FeatureRow) -> Result<Vec<f64>, PredictorError> {
        let z = self.standardize(idx, row)?;
        Ok(self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(coef, b)| coef.iter().zip(&z).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect())
    }
}

/// Numerically stable softmax.
pub fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best, best_v) }
        })
        .0
}

impl Predictor for LinearPipeline {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<String>, PredictorError> {
        rows.iter()
            .enumerate()
            .map(|(idx, row)| {
                let scores = self.decision_function(idx, row)?;
                Ok(self.classes[argmax(&scores)].clone())
            })
            .collect()
    }

    fn predict_proba(&self, rows: &[FeatureRow]) -> Result<Vec<Vec<f64>>, PredictorError> {
        rows.iter()
            .enumerate()
            .map(|(idx, row)| Ok(softmax(&self.decision_function(idx, row)?)))
            .collect()
    }
}
