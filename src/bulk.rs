//! Bulk prediction over an uploaded CSV file.
//!
//! A request moves through format check, parse, column validation, one
//! batched prediction, label append and re-encoding. Any failure aborts the
//! whole request; no partial output is ever produced.

use crate::error::{ServiceError, ServiceResult};
use crate::inference::InferenceService;
use crate::table::RawTable;
use bytes::Bytes;

pub const ACCEPTED_EXTENSION: &str = ".csv";
pub const OUTPUT_FILE_NAME: &str = "predictions.csv";
pub const OUTPUT_CONTENT_TYPE: &str = "text/csv";

/// Rejects uploads whose file name does not end in `.csv` (any case). Called
/// before any body byte is read.
pub fn check_format(filename: Option<&str>) -> ServiceResult<()> {
    let accepted = filename.is_some_and(|name| {
        name.len() >= ACCEPTED_EXTENSION.len()
            && name.is_char_boundary(name.len() - ACCEPTED_EXTENSION.len())
            && name[name.len() - ACCEPTED_EXTENSION.len()..]
                .eq_ignore_ascii_case(ACCEPTED_EXTENSION)
    });
    if !accepted {
        log::debug!("Rejected upload with file name {:?}", filename);
        return Err(ServiceError::UnsupportedFormat);
    }
    Ok(())
}

#[derive(Clone)]
pub struct BulkPipeline {
    inference: InferenceService,
}

impl BulkPipeline {
    pub fn new(inference: InferenceService) -> Self {
        BulkPipeline { inference }
    }

    /// Runs the whole pipeline on an already received upload and returns the
    /// encoded result table.
    pub fn run(&self, filename: Option<&str>, data: &[u8]) -> ServiceResult<Bytes> {
        check_format(filename)?;

        let raw = RawTable::from_csv(data)?;
        log::debug!(
            "Parsed {} rows with columns {:?}",
            raw.row_count(),
            raw.headers().collect::<Vec<_>>()
        );

        let features = raw.into_features().inspect_err(|e| {
            if let ServiceError::SchemaMismatch { missing } = e {
                log::warn!("Bulk upload missing columns: {}", missing.join(", "));
            }
        })?;

        let predicted = self.inference.predict_many(features)?;
        let output = predicted.to_csv()?;
        log::info!(
            "Bulk prediction served {} rows ({} bytes)",
            predicted.row_count(),
            output.len()
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::tests::ThresholdPredictor;
    use crate::schema::CANONICAL_COLUMNS;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    fn pipeline() -> (BulkPipeline, Arc<ThresholdPredictor>) {
        let predictor = Arc::new(ThresholdPredictor::new());
        let service = InferenceService::new(predictor.clone());
        (BulkPipeline::new(service), predictor)
    }

    fn parse_output(out: &[u8]) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_reader(out);
        let headers = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (headers, rows)
    }

    #[test]
    fn test_check_format() {
        assert!(check_format(Some("stars.csv")).is_ok());
        assert!(check_format(Some("STARS.CSV")).is_ok());
        assert!(check_format(Some(".csv")).is_ok());
        assert!(check_format(Some("stars.tsv")).is_err());
        assert!(check_format(Some("stars.csv.gz")).is_err());
        assert!(check_format(Some("csv")).is_err());
        assert!(check_format(Some("ünï")).is_err());
        assert!(check_format(None).is_err());
    }

    #[test]
    fn test_wrong_extension_is_rejected_before_parsing() {
        let (pipeline, predictor) = pipeline();
        // Not CSV at all; a parse attempt would fail differently.
        let err = pipeline.run(Some("stars.xlsx"), b"\xff\x00\x01").unwrap_err();
        assert!(matches!(err, ServiceError::UnsupportedFormat));
        assert_eq!(predictor.predict_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_extra_column_is_dropped_and_labels_appended() {
        let (pipeline, predictor) = pipeline();
        let data = "\
Temperature (K),Luminosity(L/Lo),Radius(R/Ro),Absolute magnitude(Mv),Extra
3068,0.0024,0.17,16.12,a
25000,0.056,0.0084,10.58,b
3600,0.0029,0.51,10.69,c
39000,204000,10.6,-4.7,d
3749,550000,1648,-8.05,e
";
        let out = pipeline.run(Some("stars.csv"), data.as_bytes()).unwrap();
        let (headers, rows) = parse_output(&out);

        let mut expected_headers: Vec<String> =
            CANONICAL_COLUMNS.iter().map(|c| c.to_string()).collect();
        expected_headers.push("Predicted Type".to_string());
        assert_eq!(headers, expected_headers);
        assert_eq!(rows.len(), 5);
        let temps: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(temps, ["3068", "25000", "3600", "39000", "3749"]);
        let labels: Vec<&str> = rows.iter().map(|r| r[4].as_str()).collect();
        assert_eq!(labels, ["Cold", "Hot", "Cold", "Hot", "Cold"]);
        assert_eq!(predictor.predict_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_column_order_does_not_matter() {
        let (pipeline, _) = pipeline();
        let data = "\
Radius(R/Ro),Absolute magnitude(Mv),Luminosity(L/Lo),Temperature (K)
0.17,16.12,0.0024,3068
";
        let out = pipeline.run(Some("stars.csv"), data.as_bytes()).unwrap();
        let (_, rows) = parse_output(&out);
        assert_eq!(rows, vec![vec!["3068", "0.0024", "0.17", "16.12", "Cold"]]);
    }

    #[test]
    fn test_any_missing_column_is_a_schema_mismatch() {
        let (pipeline, predictor) = pipeline();
        for skipped in 0..CANONICAL_COLUMNS.len() {
            let header: Vec<&str> = CANONICAL_COLUMNS
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skipped)
                .map(|(_, c)| *c)
                .collect();
            let data = format!("{}\n1,2,3\n", header.join(","));
            let err = pipeline.run(Some("stars.csv"), data.as_bytes()).unwrap_err();
            let message = err.to_string();
            assert!(matches!(err, ServiceError::SchemaMismatch { .. }));
            for column in CANONICAL_COLUMNS {
                assert!(message.contains(column), "{column} missing from {message}");
            }
        }
        assert_eq!(predictor.predict_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_malformed_csv_is_a_parse_error() {
        let (pipeline, _) = pipeline();
        let data = "\
Temperature (K),Luminosity(L/Lo),Radius(R/Ro),Absolute magnitude(Mv)
3068,0.0024
";
        let err = pipeline.run(Some("stars.csv"), data.as_bytes()).unwrap_err();
        assert!(matches!(err, ServiceError::ParseError(_)));
    }

    #[test]
    fn test_header_only_upload_returns_header_only_table() {
        let (pipeline, _) = pipeline();
        let data = "Temperature (K),Luminosity(L/Lo),Radius(R/Ro),Absolute magnitude(Mv)\n";
        let out = pipeline.run(Some("stars.csv"), data.as_bytes()).unwrap();
        let (headers, rows) = parse_output(&out);
        assert_eq!(headers.len(), 5);
        assert!(rows.is_empty());
    }
}
