//! Tabular stages of a bulk request.
//!
//! * [`RawTable`]: header and string records exactly as parsed from CSV.
//! * [`FeatureTable`]: typed rows in canonical column order, extra columns
//!   dropped.
//! * [`PredictedTable`]: feature rows plus one predicted label per row.

use crate::error::{ServiceError, ServiceResult};
use crate::schema::{
    self, ABSOLUTE_MAGNITUDE, FEATURE_COUNT, FEATURE_SCHEMA, FeatureRecord,
    FeatureValue, LUMINOSITY, PREDICTED_TYPE_COLUMN, RADIUS, TEMPERATURE,
};
use bytes::Bytes;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};

#[derive(Debug, Clone)]
pub struct RawTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl RawTable {
    /// Parses CSV bytes with a mandatory header row. Ragged rows, invalid
    /// UTF-8 and an empty input are parse errors.
    pub fn from_csv(data: &[u8]) -> ServiceResult<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(data);

        let headers = reader
            .headers()
            .map_err(|e| ServiceError::ParseError(e.to_string()))?
            .clone();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(ServiceError::ParseError(
                "no columns to parse from file".to_string(),
            ));
        }

        let records = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServiceError::ParseError(e.to_string()))?;

        Ok(RawTable { headers, records })
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.headers.iter()
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Checks the header against the canonical schema, then selects and
    /// reorders the canonical columns of every row. Extra columns are dropped.
    pub fn into_features(self) -> ServiceResult<FeatureTable> {
        let positions = schema::reconcile_columns(self.headers.iter())?;

        let rows = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let mut values = [FeatureValue::Integer(0); FEATURE_COUNT];
                for ((slot, column), &pos) in
                    values.iter_mut().zip(FEATURE_SCHEMA.iter()).zip(&positions)
                {
                    let raw = record.get(pos).unwrap_or_default();
                    *slot = column.kind.coerce_str(raw).ok_or_else(|| {
                        ServiceError::ParseError(format!(
                            "row {}, column '{}': expected {}, found '{}'",
                            i + 1,
                            column.name,
                            column.kind.describe(),
                            raw
                        ))
                    })?;
                }
                Ok(FeatureRecord::from_values(values))
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(FeatureTable::new(rows))
    }
}

/// Rows in canonical column order, ready for the predictor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRecord>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRecord>) -> Self {
        FeatureTable { rows }
    }

    pub fn rows(&self) -> &[FeatureRecord] {
        &self.rows
    }

    /// Appends the label column. Callers guarantee one label per row.
    pub fn with_labels(self, labels: Vec<String>) -> PredictedTable {
        debug_assert_eq!(self.rows.len(), labels.len());
        PredictedTable {
            rows: self.rows,
            labels,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictedTable {
    rows: Vec<FeatureRecord>,
    labels: Vec<String>,
}

impl PredictedTable {
    pub fn rows(&self) -> &[FeatureRecord] {
        &self.rows
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names() -> [&'static str; FEATURE_COUNT + 1] {
        [
            TEMPERATURE,
            LUMINOSITY,
            RADIUS,
            ABSOLUTE_MAGNITUDE,
            PREDICTED_TYPE_COLUMN,
        ]
    }

    /// Encodes the table as CSV: the canonical columns followed by
    /// `Predicted Type`, no index column.
    pub fn to_csv(&self) -> ServiceResult<Bytes> {
        let mut writer = WriterBuilder::new().from_writer(Vec::new());
        writer
            .write_record(Self::column_names())
            .map_err(internal_csv_error)?;
        for (row, label) in self.rows.iter().zip(&self.labels) {
            writer
                .write_record([
                    row.temperature.to_string(),
                    format_real(row.luminosity),
                    format_real(row.radius),
                    format_real(row.absolute_magnitude),
                    label.clone(),
                ])
                .map_err(internal_csv_error)?;
        }
        let data = writer
            .into_inner()
            .map_err(|e| internal_csv_error(e.into_error()))?;
        Ok(Bytes::from(data))
    }
}

/// Shortest round-trip form that always keeps a decimal point or exponent,
/// e.g. `204000.0`, `0.0024`, `1e20`.
fn format_real(v: f64) -> String {
    format!("{v:?}")
}

fn internal_csv_error(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::Internal(format!("failed to encode CSV output: {e}"))
}
