//! Canonical feature schema and the validation/coercion rules for both the
//! single-record JSON body and the header of an uploaded CSV table.
//!
//! The column names are part of the wire contract and are matched exactly,
//! including case, spaces and the embedded unit symbols.

use crate::error::{FieldError, ServiceError, ServiceResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const TEMPERATURE: &str = "Temperature (K)";
pub const LUMINOSITY: &str = "Luminosity(L/Lo)";
pub const RADIUS: &str = "Radius(R/Ro)";
pub const ABSOLUTE_MAGNITUDE: &str = "Absolute magnitude(Mv)";

/// Name of the column appended to bulk results.
pub const PREDICTED_TYPE_COLUMN: &str = "Predicted Type";

pub const FEATURE_COUNT: usize = 4;

/// Canonical column order. The predictor consumes features positionally in
/// exactly this order.
pub const CANONICAL_COLUMNS: [&str; FEATURE_COUNT] =
    [TEMPERATURE, LUMINOSITY, RADIUS, ABSOLUTE_MAGNITUDE];

/// One row as handed to the predictor, in canonical order.
pub type FeatureRow = [f64; FEATURE_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Integer,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureColumn {
    pub name: &'static str,
    pub kind: FeatureKind,
}

/// Every column is required; a missing or `null` value is rejected.
pub const FEATURE_SCHEMA: [FeatureColumn; FEATURE_COUNT] = [
    FeatureColumn {
        name: TEMPERATURE,
        kind: FeatureKind::Integer,
    },
    FeatureColumn {
        name: LUMINOSITY,
        kind: FeatureKind::Real,
    },
    FeatureColumn {
        name: RADIUS,
        kind: FeatureKind::Real,
    },
    FeatureColumn {
        name: ABSOLUTE_MAGNITUDE,
        kind: FeatureKind::Real,
    },
];

/// A coerced cell value, typed according to its [`FeatureKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Integer(i64),
    Real(f64),
}

impl FeatureValue {
    fn as_i64(self) -> i64 {
        match self {
            FeatureValue::Integer(v) => v,
            FeatureValue::Real(v) => v as i64,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            FeatureValue::Integer(v) => v as f64,
            FeatureValue::Real(v) => v,
        }
    }
}

/// Integral floats (`3050.0`) are accepted for integer columns, anything with
/// a fractional part is not.
fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

impl FeatureKind {
    /// JSON strings go through the same rules as CSV cells.
    pub fn coerce_json(self, value: &Value) -> Option<FeatureValue> {
        let number = match value {
            Value::Number(number) => number,
            Value::String(s) => return self.coerce_str(s),
            _ => return None,
        };
        match self {
            FeatureKind::Integer => number
                .as_i64()
                .or_else(|| number.as_f64().and_then(integral))
                .map(FeatureValue::Integer),
            FeatureKind::Real => number.as_f64().map(FeatureValue::Real),
        }
    }

    pub fn coerce_str(self, raw: &str) -> Option<FeatureValue> {
        let raw = raw.trim();
        match self {
            FeatureKind::Integer => raw
                .parse::<i64>()
                .ok()
                .or_else(|| raw.parse::<f64>().ok().and_then(integral))
                .map(FeatureValue::Integer),
            FeatureKind::Real => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FeatureValue::Real),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            FeatureKind::Integer => "a valid integer",
            FeatureKind::Real => "a valid number",
        }
    }

    fn error_type(self) -> &'static str {
        match self {
            FeatureKind::Integer => "int_parsing",
            FeatureKind::Real => "float_parsing",
        }
    }
}

/// One star's measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    #[serde(rename = "Temperature (K)")]
    pub temperature: i64,
    #[serde(rename = "Luminosity(L/Lo)")]
    pub luminosity: f64,
    #[serde(rename = "Radius(R/Ro)")]
    pub radius: f64,
    #[serde(rename = "Absolute magnitude(Mv)")]
    pub absolute_magnitude: f64,
}

impl FeatureRecord {
    /// Builds a record from coerced values given in canonical order.
    pub fn from_values(values: [FeatureValue; FEATURE_COUNT]) -> Self {
        FeatureRecord {
            temperature: values[0].as_i64(),
            luminosity: values[1].as_f64(),
            radius: values[2].as_f64(),
            absolute_magnitude: values[3].as_f64(),
        }
    }

    pub fn to_row(&self) -> FeatureRow {
        [
            self.temperature as f64,
            self.luminosity,
            self.radius,
            self.absolute_magnitude,
        ]
    }
}

/// Binds a `/predict` JSON body to a [`FeatureRecord`].
///
/// Every canonical field is checked; all offending fields are reported
/// together. Unknown keys are ignored.
pub fn bind_record(body: &Value) -> ServiceResult<FeatureRecord> {
    let Some(object) = body.as_object() else {
        return Err(ServiceError::InvalidInput(vec![FieldError {
            loc: vec!["body".to_string()],
            msg: "Input should be a valid dictionary".to_string(),
            kind: "model_attributes_type".to_string(),
        }]));
    };

    let mut errors = Vec::new();
    let mut values = [FeatureValue::Integer(0); FEATURE_COUNT];
    for (slot, column) in values.iter_mut().zip(FEATURE_SCHEMA.iter()) {
        match object.get(column.name) {
            None | Some(Value::Null) => errors.push(FieldError::missing(column.name)),
            Some(raw) => match column.kind.coerce_json(raw) {
                Some(value) => *slot = value,
                None => errors.push(FieldError::invalid(
                    column.name,
                    format!("Input should be {}", column.kind.describe()),
                    column.kind.error_type(),
                )),
            },
        }
    }

    if !errors.is_empty() {
        return Err(ServiceError::InvalidInput(errors));
    }
    Ok(FeatureRecord::from_values(values))
}

/// Locates the canonical columns inside a CSV header.
///
/// Returns the header index of each canonical column, in canonical order.
/// Extra columns are allowed and simply not referenced. When a name appears
/// more than once, the first occurrence wins.
pub fn reconcile_columns<'a, I>(headers: I) -> ServiceResult<[usize; FEATURE_COUNT]>
where
    I: IntoIterator<Item = &'a str>,
{
    let headers: Vec<&str> = headers.into_iter().collect();
    let mut positions = [0usize; FEATURE_COUNT];
    let mut missing = Vec::new();
    for (slot, column) in positions.iter_mut().zip(CANONICAL_COLUMNS) {
        match headers.iter().position(|h| *h == column) {
            Some(idx) => *slot = idx,
            None => missing.push(column.to_string()),
        }
    }

    if !missing.is_empty() {
        return Err(ServiceError::SchemaMismatch { missing });
    }
    Ok(positions)
}
